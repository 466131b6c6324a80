// 分享 API 数据类型

use serde::{Deserialize, Deserializer, Serialize};

use crate::provider::surl::ShareReference;

/// 分享文件条目（provider 原始记录，不落库）
///
/// GET 与 POST 两个列表端点对同一字段返回的 JSON 类型不一致
/// （如 isdir 可能是 "1" 也可能是 1），反序列化时统一容错
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareFileItem {
    /// 文件服务器ID
    #[serde(rename = "fs_id", default, deserialize_with = "de_string_flex")]
    pub fs_id: String,

    /// 服务器文件名
    #[serde(default)]
    pub server_filename: String,

    /// 文件路径
    #[serde(default)]
    pub path: String,

    /// 文件大小（字节）
    #[serde(default, deserialize_with = "de_u64_flex")]
    pub size: u64,

    /// 是否是目录 (0=文件, 1=目录)
    #[serde(default, deserialize_with = "de_i64_flex")]
    pub isdir: i64,

    /// 文件类别 (1=视频, 3=图片)
    #[serde(default, deserialize_with = "de_i64_flex")]
    pub category: i64,

    /// MD5（仅部分响应携带）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    /// 时长（秒，仅媒体文件）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// 缩略图集合
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbs: Option<ThumbSet>,

    /// 直链（仅鉴权列表返回）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlink: Option<String>,
}

impl ShareFileItem {
    /// 是否是目录
    pub fn is_directory(&self) -> bool {
        self.isdir == 1
    }
}

/// 缩略图集合（url3 最大，icon 最小）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThumbSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url1: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url2: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url3: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ThumbSet {
    /// 按清晰度优先级挑选缩略图
    pub fn preferred(&self) -> Option<&str> {
        self.url3
            .as_deref()
            .or(self.url2.as_deref())
            .or(self.url1.as_deref())
            .or(self.icon.as_deref())
    }
}

/// 分享列表响应
#[derive(Debug, Deserialize)]
pub struct ShareListResponse {
    /// 错误码（0表示成功）
    pub errno: i32,

    /// 错误信息
    #[serde(default)]
    pub errmsg: String,

    /// 文件列表
    #[serde(default)]
    pub list: Vec<ShareFileItem>,

    /// 分享标题
    #[serde(default)]
    pub title: Option<String>,

    /// 分享者用户名
    #[serde(default)]
    pub share_username: Option<String>,
}

impl ShareListResponse {
    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.errno == 0
    }
}

/// 一次分享解析得到的完整列表
#[derive(Debug, Clone)]
pub struct ShareListing {
    /// 分享引用（surl + 最终 URL）
    pub share: ShareReference,
    /// 标题（单目录下钻时为目录名，否则为分享标题）
    pub title: Option<String>,
    /// 分享者用户名
    pub share_username: Option<String>,
    /// 原始条目（可能包含目录，规范化时过滤）
    pub files: Vec<ShareFileItem>,
}

/// 分享解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// 无法从链接中提取 surl（终止性错误，需要用户更换链接）
    NoSurlFound,
    /// 两种列表策略均失败
    ListingFailed(String),
    /// 网络错误
    Network(String),
}

impl std::fmt::Display for ShareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareError::NoSurlFound => write!(f, "无法从分享链接中提取 surl"),
            ShareError::ListingFailed(msg) => write!(f, "分享列表获取失败: {}", msg),
            ShareError::Network(msg) => write!(f, "网络错误: {}", msg),
        }
    }
}

impl std::error::Error for ShareError {}

/// 字符串或数字 -> String
fn de_string_flex<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => n.to_string(),
        Raw::Str(s) => s,
    })
}

/// 字符串或数字 -> i64（无法解析时取 0）
fn de_i64_flex<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => n,
        Raw::Str(s) => s.trim().parse().unwrap_or(0),
    })
}

/// 字符串或数字 -> u64（无法解析时取 0）
fn de_u64_flex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Num(n) => n,
        Raw::Str(s) => s.trim().parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_field_types() {
        // GET 端点：全部字符串
        let from_get: ShareFileItem = serde_json::from_str(
            r#"{"fs_id": "123456", "server_filename": "a.mp4", "path": "/a.mp4",
                "size": "2048", "isdir": "0", "category": "1"}"#,
        )
        .unwrap();
        assert_eq!(from_get.fs_id, "123456");
        assert_eq!(from_get.size, 2048);
        assert!(!from_get.is_directory());

        // POST 端点：全部数字
        let from_post: ShareFileItem = serde_json::from_str(
            r#"{"fs_id": 123456, "server_filename": "dir", "path": "/dir",
                "size": 0, "isdir": 1, "category": 6}"#,
        )
        .unwrap();
        assert_eq!(from_post.fs_id, "123456");
        assert!(from_post.is_directory());
    }

    #[test]
    fn test_thumb_preference_order() {
        let thumbs = ThumbSet {
            url1: Some("u1".to_string()),
            url2: Some("u2".to_string()),
            url3: Some("u3".to_string()),
            icon: Some("icon".to_string()),
        };
        assert_eq!(thumbs.preferred(), Some("u3"));

        let only_icon = ThumbSet {
            icon: Some("icon".to_string()),
            ..Default::default()
        };
        assert_eq!(only_icon.preferred(), Some("icon"));

        assert_eq!(ThumbSet::default().preferred(), None);
    }

    #[test]
    fn test_list_response_defaults() {
        let resp: ShareListResponse = serde_json::from_str(r#"{"errno": 0}"#).unwrap();
        assert!(resp.is_success());
        assert!(resp.list.is_empty());
        assert!(resp.title.is_none());

        let err: ShareListResponse =
            serde_json::from_str(r#"{"errno": -9, "errmsg": "not exist"}"#).unwrap();
        assert!(!err.is_success());
        assert_eq!(err.errmsg, "not exist");
    }
}
