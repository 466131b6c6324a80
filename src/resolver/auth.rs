// 鉴权直链解析
//
// 用持久化的登录会话（Cookie + jsToken）换取每个文件的短时效直链。
// 会话由外部凭证采集流程写入 settings，这里只读并在成功后回写使用时间。

use crate::catalog::CatalogStore;
use crate::provider::surl::extract_surl;
use crate::provider::types::ShareListResponse;
use crate::resolver::types::{AuthError, AuthSession, ResolvedFileLinks};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// settings 中保存登录会话的键
pub const AUTH_SESSION_KEY: &str = "terabox_auth";

/// 鉴权列表端点与来源站点
const AUTH_LIST_ENDPOINT: &str = "https://dm.1024tera.com/share/list";
const AUTH_ORIGIN: &str = "https://www.1024tera.com";
const AUTH_SITE_REFERER: &str = "https://www.1024tera.com/";

/// 鉴权请求 UA（与凭证采集时的浏览器保持一致）
const AUTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/130";

/// 鉴权直链解析器
#[derive(Clone)]
pub struct AuthResolver {
    /// HTTP客户端
    client: Client,
    /// 目录存储（会话读写）
    catalog: Arc<CatalogStore>,
}

impl AuthResolver {
    /// 创建新的鉴权解析器
    pub fn new(catalog: Arc<CatalogStore>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(AUTH_USER_AGENT)
            .timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, catalog })
    }

    /// 用已保存的会话解析分享内每个文件的直链
    ///
    /// 返回 provider 文件 id 到直链集合的映射；目录条目被跳过，
    /// 目录中不存在的 id 由调用方静默忽略
    pub async fn resolve(
        &self,
        share_url: &str,
    ) -> Result<HashMap<String, ResolvedFileLinks>, AuthError> {
        let mut session = self.load_session()?;
        let surl = extract_surl(share_url).ok_or(AuthError::NoSurl)?;
        let cookie = session.cookie_header();

        let root = self
            .fetch_list(&surl, &session.js_token, &cookie, "")
            .await?;
        if !root.is_success() {
            let message = if root.errmsg.is_empty() {
                format!("errno={}", root.errno)
            } else {
                root.errmsg
            };
            return Err(AuthError::Provider(message));
        }

        // 鉴权调用成功，回写会话使用时间（尽力而为，不与直链更新同事务）
        self.touch_session(&mut session);

        let mut items = root.list;

        // 单目录分享下钻一层
        if items.len() == 1 && items[0].is_directory() {
            let dir = items[0].path.clone();
            info!("鉴权列表为单个目录，下钻: {}", dir);
            let inner = self
                .fetch_list(&surl, &session.js_token, &cookie, &dir)
                .await?;
            items = inner.list;
        }

        let mut links = HashMap::new();
        for item in items.into_iter().filter(|f| !f.is_directory()) {
            let fast_stream_url = item
                .thumbs
                .as_ref()
                .and_then(|t| serde_json::to_string(t).ok());
            links.insert(
                item.fs_id.clone(),
                ResolvedFileLinks {
                    stream_url: item.dlink.clone(),
                    fast_stream_url,
                    download_url: item.dlink,
                },
            );
        }

        info!("鉴权解析得到 {} 个文件的直链", links.len());
        Ok(links)
    }

    /// 读取持久化会话
    fn load_session(&self) -> Result<AuthSession, AuthError> {
        let raw = self
            .catalog
            .get_setting(AUTH_SESSION_KEY)
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .ok_or(AuthError::NotConfigured)?;

        serde_json::from_str(&raw).map_err(|e| {
            warn!("登录会话反序列化失败: {}", e);
            AuthError::NotConfigured
        })
    }

    /// 回写 last_successful_usage_at（失败仅告警）
    fn touch_session(&self, session: &mut AuthSession) {
        session.last_successful_usage_at = Some(Utc::now().to_rfc3339());
        match serde_json::to_string(session) {
            Ok(raw) => {
                if let Err(e) = self.catalog.set_setting(AUTH_SESSION_KEY, &raw) {
                    warn!("更新会话使用时间失败: {}", e);
                }
            }
            Err(e) => warn!("序列化登录会话失败: {}", e),
        }
    }

    /// 携带会话请求鉴权列表端点
    ///
    /// dir 为空时取根目录（root=1），否则按路径下钻
    async fn fetch_list(
        &self,
        surl: &str,
        js_token: &str,
        cookie: &str,
        dir: &str,
    ) -> Result<ShareListResponse, AuthError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("app_id", "250528"),
            ("web", "1"),
            ("channel", "dubox"),
            ("clienttype", "0"),
            ("shorturl", surl),
            ("jsToken", js_token),
            ("page", "1"),
            ("num", "100"),
            ("order", "asc"),
            ("by", "name"),
            ("site_referer", AUTH_SITE_REFERER),
        ];
        if dir.is_empty() {
            params.push(("root", "1"));
        } else {
            params.push(("dir", dir));
        }

        let referer = format!("{}/sharing/link?surl={}", AUTH_ORIGIN, surl);

        let resp = self
            .client
            .get(AUTH_LIST_ENDPOINT)
            .query(&params)
            .header("Cookie", cookie)
            .header("Referer", referer)
            .header("Origin", AUTH_ORIGIN)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let text = resp
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        serde_json::from_str(&text).map_err(|_| {
            AuthError::Provider("响应不是合法 JSON，请检查凭证与 jsToken".to_string())
        })
    }
}
