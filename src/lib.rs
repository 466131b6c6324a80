// TeraBox 分享解析与流媒体目录服务核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 分享协议模块（surl 提取 + 两策略列表客户端）
pub mod provider;

// 预览规范化模块（纯函数）
pub mod preview;

// 鉴权解析模块（直链解析 + 单飞行队列）
pub mod resolver;

// 目录存储模块
pub mod catalog;

// 流式投递模块
pub mod stream;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use catalog::{CatalogFile, CatalogStore, Container, ContainerStatus};
pub use config::AppConfig;
pub use preview::{group_files, normalize_preview, FileGroup, NormalizedFile, SharePreview};
pub use provider::{extract_surl, ShareError, ShareListing, ShareListingClient, ShareReference};
pub use resolver::{
    links_stale, AuthError, AuthResolver, AuthSession, JobHandle, QueueStatus, ResolveSummary,
    ResolvedFileLinks, ResolverQueue, AUTH_LINK_TTL_MS,
};
pub use server::AppState;
pub use stream::{parse_range, ByteRange};
