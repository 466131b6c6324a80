// 流式投递模块

pub mod proxy;
pub mod range;

pub use proxy::{error_response, proxy_remote_stream, serve_local_file};
pub use range::{parse_range, ByteRange};
