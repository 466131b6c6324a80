// 分享协议模块

pub mod client;
pub mod surl;
pub mod types;

pub use client::{ShareListingClient, BROWSER_USER_AGENT, MAX_FOLDER_DEPTH};
pub use surl::{extract_surl, ShareReference};
pub use types::{ShareError, ShareFileItem, ShareListResponse, ShareListing, ThumbSet};
