// surl 提取

use regex::Regex;
use std::sync::OnceLock;

/// 分享链接解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReference {
    /// provider 的分享短令牌
    pub surl: String,
    /// 提取时使用的原始 URL
    pub source_url: String,
}

/// 路径段形式的 surl：/s/<token>
fn surl_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/s/([A-Za-z0-9_-]+)").expect("surl 路径正则"))
}

/// 从任意分享 URL 中提取 surl
///
/// 依次尝试：
/// 1. 查询参数 `?surl=...`，去掉单个前导 '1'（provider 短链编码前缀，
///    仅查询参数形式携带）
/// 2. 路径段 `/s/<token>`，原样保留
///
/// URL 无法解析或两种形式都不匹配时返回 None，调用方应视为终止性失败
pub fn extract_surl(input_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(input_url).ok()?;

    if let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "surl") {
        let token = value.strip_prefix('1').unwrap_or(&value);
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    surl_path_pattern()
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_form() {
        assert_eq!(
            extract_surl("https://www.1024tera.com/sharing/link?surl=abcDEF-_9"),
            Some("abcDEF-_9".to_string())
        );
    }

    #[test]
    fn test_query_param_strips_single_leading_one() {
        assert_eq!(
            extract_surl("https://www.terabox.com/sharing/link?surl=1abcDEF"),
            Some("abcDEF".to_string())
        );
        // 只去一个前导 '1'
        assert_eq!(
            extract_surl("https://www.terabox.com/sharing/link?surl=11abc"),
            Some("1abc".to_string())
        );
    }

    #[test]
    fn test_path_form_keeps_leading_one() {
        assert_eq!(
            extract_surl("https://terabox.com/s/1abcDEFg"),
            Some("1abcDEFg".to_string())
        );
        assert_eq!(
            extract_surl("https://dm.terabox.app/s/xY-z_12?pwd=0000"),
            Some("xY-z_12".to_string())
        );
    }

    #[test]
    fn test_query_param_takes_precedence_over_path() {
        assert_eq!(
            extract_surl("https://terabox.com/s/1ignored?surl=1kept"),
            Some("kept".to_string())
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_surl("https://terabox.com/about"), None);
        assert_eq!(extract_surl("not a url"), None);
        // 空的查询参数回退到路径匹配，路径也不匹配时为 None
        assert_eq!(extract_surl("https://terabox.com/home?surl="), None);
    }
}
