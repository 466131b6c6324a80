// 应用状态

use crate::catalog::CatalogStore;
use crate::config::AppConfig;
use crate::provider::ShareListingClient;
use crate::resolver::{AuthResolver, ResolveSummary, ResolverQueue};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// 应用全局状态
///
/// 解析队列在这里创建一次，随状态注入各路由，保持全进程单飞行约束
/// 而不依赖隐藏的全局单例
#[derive(Clone)]
pub struct AppState {
    /// 目录存储
    pub catalog: Arc<CatalogStore>,
    /// 分享列表客户端
    pub listing: Arc<ShareListingClient>,
    /// 鉴权直链解析器
    pub auth_resolver: Arc<AuthResolver>,
    /// 解析任务队列（全局唯一，单飞行）
    pub resolver_queue: Arc<ResolverQueue<ResolveSummary>>,
    /// 流代理使用的 HTTP 客户端
    pub stream_client: reqwest::Client,
    /// 应用配置
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: AppConfig) -> Result<Self> {
        let catalog = Arc::new(CatalogStore::new(&config.catalog.db_path)?);
        let listing = Arc::new(ShareListingClient::new()?);
        let auth_resolver = Arc::new(AuthResolver::new(Arc::clone(&catalog))?);
        let resolver_queue = Arc::new(ResolverQueue::new(Some(Duration::from_secs(
            config.resolver.job_timeout_secs,
        ))));

        // 播放会话可能持续很久，只限制连接超时，不限制整体超时
        let stream_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            catalog,
            listing,
            auth_resolver,
            resolver_queue,
            stream_client,
            config: Arc::new(config),
        })
    }
}
