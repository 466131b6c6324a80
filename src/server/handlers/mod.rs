// API处理器模块

pub mod auth;
pub mod containers;
pub mod files;
pub mod preview;
pub mod resolve;
pub mod settings;
pub mod stream;
pub mod system;

pub use auth::*;
pub use containers::*;
pub use files::*;
pub use preview::*;
pub use resolve::*;
pub use settings::*;
pub use stream::*;
pub use system::*;

use serde::Serialize;

/// 统一响应包装
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}
