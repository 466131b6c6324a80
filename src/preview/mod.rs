// 预览规范化模块（纯函数，无 I/O）

pub mod group;
pub mod normalize;

pub use group::{group_files, FileGroup};
pub use normalize::{
    classify, fingerprint, folder_name_of, human_size, normalize_preview, ContainerType, FileKind,
    NormalizedFile, SharePreview, PROVIDER_TERABOX,
};
