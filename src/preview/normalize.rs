// 预览规范化
//
// 从原始分享列表到规范化文件记录的纯函数：不做任何网络或磁盘访问，
// 保证可以单独测试、重复运行结果逐字节一致。

use crate::provider::types::{ShareFileItem, ShareListing};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;

/// 固定 provider 标识
pub const PROVIDER_TERABOX: &str = "terabox";

/// 已知视频扩展名（category 缺失时的兜底判断）
const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".flv", ".wmv", ".webm", ".m4v",
];

/// 内容类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Folder,
    Video,
    Image,
    Other,
}

/// 容器形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    /// 单个文件
    Single,
    /// 多个文件
    Multi,
}

/// 规范化后的文件记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFile {
    /// provider 标识（固定为 terabox）
    pub provider: String,
    /// provider 的文件 id
    pub provider_file_id: String,
    /// 文件名
    pub name: String,
    /// 分享内原始路径
    pub original_path: Option<String>,
    /// 父目录名（路径不足两段时为空）
    pub folder_name: Option<String>,
    /// 文件大小（字节）
    pub size_bytes: Option<u64>,
    /// 可读大小
    pub size_human: Option<String>,
    /// MIME 类型（按类别/扩展名启发式推导）
    pub mime_type: Option<String>,
    /// 缩略图（按清晰度优先）
    pub thumbnail_url: Option<String>,
    /// 是否可播放（视频）
    pub is_playable: bool,
    /// 是否是组内首个文件
    pub is_primary: bool,
    /// 内容指纹（目录内去重用）
    pub fingerprint: String,
}

/// 预览结果
#[derive(Debug, Clone, Serialize)]
pub struct SharePreview {
    /// provider 标识
    pub provider: String,
    /// 解析时的最终 URL
    pub source_url: String,
    /// 容器形态
    pub container_type: ContainerType,
    /// 推导出的标题
    pub title: String,
    /// 文件数
    pub file_count: usize,
    /// 总大小（字节）
    pub total_size_bytes: Option<u64>,
    /// 可读总大小
    pub total_size_human: Option<String>,
    /// 是否含视频
    pub has_video: bool,
    /// 规范化后的文件
    pub files: Vec<NormalizedFile>,
}

/// 内容类别判定：目录优先，其次 provider 类别码，最后扩展名兜底
pub fn classify(entry: &ShareFileItem) -> FileKind {
    if entry.is_directory() {
        return FileKind::Folder;
    }
    match entry.category {
        1 => FileKind::Video,
        3 => FileKind::Image,
        _ => {
            let lower = entry.server_filename.to_lowercase();
            if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
                FileKind::Video
            } else {
                FileKind::Other
            }
        }
    }
}

/// 内容指纹
///
/// 优先级：provider 上报的 md5 > 名称+大小哈希 > 文件 id 兜底。
/// 同一内容在目录中只出现一次，由存储层的唯一索引兜底
pub fn fingerprint(entry: &ShareFileItem) -> String {
    if let Some(md5) = entry.md5.as_deref().filter(|m| !m.is_empty()) {
        return format!("md5:{}", md5);
    }
    if entry.size > 0 && !entry.server_filename.is_empty() {
        return format!(
            "ns:{}",
            sha1_hex(&format!("{}{}", entry.server_filename, entry.size))
        );
    }
    format!("fs:{}", entry.fs_id)
}

fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// 取父目录名：路径至少两段时为倒数第二段
pub fn folder_name_of(path: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 {
        Some(parts[parts.len() - 2].to_string())
    } else {
        None
    }
}

/// 二进制单位可读大小（两位小数）
pub fn human_size(bytes: u64) -> Option<String> {
    if bytes == 0 {
        return None;
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    Some(format!("{:.2} {}", value, UNITS[unit]))
}

/// 将原始分享列表规范化为预览结果
pub fn normalize_preview(listing: &ShareListing) -> SharePreview {
    let entries: Vec<&ShareFileItem> = listing
        .files
        .iter()
        .filter(|f| !f.is_directory())
        .collect();

    let mut total_size: u64 = 0;
    let mut has_video = false;
    let mut files = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.iter().enumerate() {
        let size = (entry.size > 0).then_some(entry.size);
        if let Some(s) = size {
            total_size += s;
        }

        let kind = classify(entry);
        if kind == FileKind::Video {
            has_video = true;
        }

        let mime_type = match kind {
            FileKind::Video => Some("video/mp4".to_string()),
            FileKind::Image => Some("image/jpeg".to_string()),
            _ => None,
        };

        files.push(NormalizedFile {
            provider: PROVIDER_TERABOX.to_string(),
            provider_file_id: entry.fs_id.clone(),
            name: entry.server_filename.clone(),
            original_path: (!entry.path.is_empty()).then(|| entry.path.clone()),
            folder_name: folder_name_of(&entry.path),
            size_bytes: size,
            size_human: size.and_then(human_size),
            mime_type,
            thumbnail_url: entry
                .thumbs
                .as_ref()
                .and_then(|t| t.preferred())
                .map(str::to_string),
            is_playable: kind == FileKind::Video,
            is_primary: idx == 0,
            fingerprint: fingerprint(entry),
        });
    }

    let title = derive_title(listing, &files);

    SharePreview {
        provider: PROVIDER_TERABOX.to_string(),
        source_url: listing.share.source_url.clone(),
        container_type: if files.len() == 1 {
            ContainerType::Single
        } else {
            ContainerType::Multi
        },
        title,
        file_count: files.len(),
        total_size_bytes: (total_size > 0).then_some(total_size),
        total_size_human: human_size(total_size),
        has_video,
        files,
    }
}

/// 容器标题推导
///
/// 多文件：所有文件共有的唯一目录名 > 分享标题 > 基于分享者用户名的兜底；
/// 单文件：文件名；空列表：分享标题 > 用户名 > 固定文案
fn derive_title(listing: &ShareListing, files: &[NormalizedFile]) -> String {
    if files.is_empty() {
        return listing
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| listing.share_username.clone().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "Empty TeraBox Share".to_string());
    }

    if files.len() > 1 {
        let folders: BTreeSet<&str> = files
            .iter()
            .filter_map(|f| f.folder_name.as_deref())
            .collect();
        let all_in_folder = files.iter().all(|f| f.folder_name.is_some());

        if folders.len() == 1 && all_in_folder {
            if let Some(folder) = folders.iter().next() {
                return (*folder).to_string();
            }
        }
        if let Some(title) = listing.title.clone().filter(|t| !t.is_empty()) {
            return title;
        }
        if let Some(username) = listing.share_username.clone().filter(|u| !u.is_empty()) {
            return format!("{}'s Share", username);
        }
        return "TeraBox Share".to_string();
    }

    files[0].name.clone()
}
