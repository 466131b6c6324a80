// 目录数据类型

use serde::{Deserialize, Serialize};

/// 容器状态机
///
/// idle → previewing → {previewed, error}
/// idle/previewed → resolving → {resolved, error}
///
/// 状态只由解析流水线驱动；error 时 error_message 携带原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Idle,
    Previewing,
    Previewed,
    Resolving,
    Resolved,
    Error,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Idle => "idle",
            ContainerStatus::Previewing => "previewing",
            ContainerStatus::Previewed => "previewed",
            ContainerStatus::Resolving => "resolving",
            ContainerStatus::Resolved => "resolved",
            ContainerStatus::Error => "error",
        }
    }

    /// 从库内字符串解析；未知值回退 idle
    pub fn parse(value: &str) -> Self {
        match value {
            "previewing" => ContainerStatus::Previewing,
            "previewed" => ContainerStatus::Previewed,
            "resolving" => ContainerStatus::Resolving,
            "resolved" => ContainerStatus::Resolved,
            "error" => ContainerStatus::Error,
            _ => ContainerStatus::Idle,
        }
    }
}

/// 容器：一条分享对应一个真实容器，多目录分享拆分为若干虚拟容器
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pub id: i64,
    /// 容器类型（terabox / local）
    #[serde(rename = "type")]
    pub container_type: String,
    /// 分享源链接
    pub source: Option<String>,
    pub title: Option<String>,
    /// 是否为虚拟容器（按目录拆分产生）
    pub is_virtual: bool,
    pub status: ContainerStatus,
    pub error_message: Option<String>,
    /// 预览成功时间（epoch 毫秒）
    pub previewed_at: Option<i64>,
    /// 直链解析成功时间（epoch 毫秒）
    pub resolved_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 目录中的文件行
#[derive(Debug, Clone, Serialize)]
pub struct CatalogFile {
    pub id: i64,
    pub container_id: i64,
    pub provider: String,
    /// provider 的文件 id
    pub fs_id: Option<String>,
    /// 本地文件路径（provider 为 local 时）
    pub local_path: Option<String>,
    pub name: Option<String>,
    pub original_path: Option<String>,
    pub folder_name: Option<String>,
    pub size_bytes: Option<i64>,
    pub duration: Option<f64>,
    pub mime_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_primary: bool,
    pub is_playable: bool,
    pub file_index: i64,
    pub fingerprint: Option<String>,
    /// 播放直链（鉴权解析写入）
    pub stream_url: Option<String>,
    /// 备选流集合（JSON）
    pub fast_stream_url: Option<String>,
    /// 下载直链
    pub download_url: Option<String>,
    /// 直链获取时间（epoch 毫秒，过期判断依据）
    pub auth_fetched_at: Option<i64>,
    /// 上次播放位置（秒）
    pub last_position_secs: Option<f64>,
    /// 观看进度百分比
    pub watch_progress_percent: Option<f64>,
    /// 上次观看时间（epoch 毫秒）
    pub last_watched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ContainerStatus::Idle,
            ContainerStatus::Previewing,
            ContainerStatus::Previewed,
            ContainerStatus::Resolving,
            ContainerStatus::Resolved,
            ContainerStatus::Error,
        ] {
            assert_eq!(ContainerStatus::parse(status.as_str()), status);
        }
        assert_eq!(ContainerStatus::parse("garbage"), ContainerStatus::Idle);
    }
}
