// 鉴权解析模块

pub mod auth;
pub mod queue;
pub mod types;

pub use auth::{AuthResolver, AUTH_SESSION_KEY};
pub use queue::{JobHandle, QueueStatus, ResolverQueue};
pub use types::{
    links_stale, AuthCookie, AuthError, AuthSession, ResolveSummary, ResolvedFileLinks,
    AUTH_LINK_TTL_MS,
};
