// 鉴权会话与直链类型

use serde::{Deserialize, Serialize};

/// 直链有效期（毫秒）
///
/// 上游直链带签名且短时效，超过该窗口视为过期，需要重新解析
pub const AUTH_LINK_TTL_MS: i64 = 4 * 60 * 60 * 1000;

/// 判断直链是否过期
///
/// auth_fetched_at 缺失视为过期；严格大于 TTL 才算过期
pub fn links_stale(auth_fetched_at: Option<i64>, now_ms: i64) -> bool {
    match auth_fetched_at {
        Some(ts) => now_ms - ts > AUTH_LINK_TTL_MS,
        None => true,
    }
}

/// 持久化的登录会话
///
/// 由外部凭证采集流程写入 settings（键 terabox_auth），本模块只读；
/// 每次成功使用后回写 last_successful_usage_at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// 页面 JS 令牌
    #[serde(rename = "jsToken")]
    pub js_token: String,

    /// 采集到的 Cookie 列表
    #[serde(default)]
    pub cookies: Vec<AuthCookie>,

    /// 采集时间（RFC3339）
    #[serde(default)]
    pub captured_at: Option<String>,

    /// 最近一次成功使用时间（RFC3339）
    #[serde(default)]
    pub last_successful_usage_at: Option<String>,
}

/// 会话中的单个 Cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCookie {
    pub domain: String,
    pub name: String,
    pub value: String,
}

impl AuthSession {
    /// 拼接 Cookie 请求头，仅保留 provider 域下的 Cookie
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .filter(|c| c.domain.contains("1024tera") || c.domain.contains("terabox"))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 单个文件解析出的直链集合
#[derive(Debug, Clone, Default)]
pub struct ResolvedFileLinks {
    /// 播放直链
    pub stream_url: Option<String>,
    /// 备选流集合（缩略图/低清流，JSON 序列化保存）
    pub fast_stream_url: Option<String>,
    /// 下载直链
    pub download_url: Option<String>,
}

/// 解析任务的结果摘要
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResolveSummary {
    /// 实际更新的文件行数
    pub updated: usize,
}

/// 鉴权解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 尚未配置登录会话，需要用户先导入凭证
    NotConfigured,
    /// 无法从容器源链接提取 surl
    NoSurl,
    /// 会话存储读写失败
    Storage(String),
    /// 网络错误
    Network(String),
    /// provider 拒绝了鉴权请求
    Provider(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "尚未配置 TeraBox 登录会话"),
            AuthError::NoSurl => write!(f, "无法从分享链接中提取 surl"),
            AuthError::Storage(msg) => write!(f, "会话存储访问失败: {}", msg),
            AuthError::Network(msg) => write!(f, "网络错误: {}", msg),
            AuthError::Provider(msg) => write!(f, "鉴权列表请求被拒绝: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
