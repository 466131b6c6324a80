// 目录分组

use crate::preview::normalize::NormalizedFile;
use serde::Serialize;

/// 无目录文件归入的分组名
const ROOT_GROUP: &str = "root";

/// 分组结果：一个真实容器或若干虚拟容器的素材
#[derive(Debug, Clone, Serialize)]
pub struct FileGroup {
    /// 分组标题（目录名或 root）
    pub title: String,
    /// 是否为虚拟容器（按目录拆分产生，非用户显式创建）
    pub is_virtual: bool,
    /// 组内文件（保持原始顺序，组内首个标记为 primary）
    pub files: Vec<NormalizedFile>,
}

/// 按父目录分组
///
/// 规则：所有文件同属一个目录（无目录的并入 root）时输出单个真实分组，
/// 标题取该目录名；目录多于一个时每个目录输出一个虚拟分组。
/// 分组按首次出现顺序排列，组内文件保持输入顺序
pub fn group_files(files: &[NormalizedFile]) -> Vec<FileGroup> {
    let mut buckets: Vec<(String, Vec<NormalizedFile>)> = Vec::new();

    for file in files {
        let key = file
            .folder_name
            .clone()
            .unwrap_or_else(|| ROOT_GROUP.to_string());
        match buckets.iter_mut().find(|(name, _)| *name == key) {
            Some((_, bucket)) => bucket.push(file.clone()),
            None => buckets.push((key, vec![file.clone()])),
        }
    }

    let is_virtual = buckets.len() > 1;

    buckets
        .into_iter()
        .map(|(title, mut files)| {
            // primary 标记以组为单位重新计算
            for (idx, file) in files.iter_mut().enumerate() {
                file.is_primary = idx == 0;
            }
            FileGroup {
                title,
                is_virtual,
                files,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, folder: Option<&str>) -> NormalizedFile {
        NormalizedFile {
            provider: "terabox".to_string(),
            provider_file_id: name.to_string(),
            name: name.to_string(),
            original_path: None,
            folder_name: folder.map(str::to_string),
            size_bytes: Some(1),
            size_human: None,
            mime_type: Some("video/mp4".to_string()),
            thumbnail_url: None,
            is_playable: true,
            is_primary: false,
            fingerprint: format!("fs:{}", name),
        }
    }

    #[test]
    fn test_single_folder_is_one_real_group() {
        let groups = group_files(&[file("x.mp4", Some("A")), file("y.mp4", Some("A"))]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "A");
        assert!(!groups[0].is_virtual);
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn test_two_folders_become_virtual_groups() {
        let groups = group_files(&[file("x.mp4", Some("A")), file("y.mp4", Some("B"))]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "A");
        assert_eq!(groups[1].title, "B");
        assert!(groups.iter().all(|g| g.is_virtual));
    }

    #[test]
    fn test_rootless_files_group_as_root() {
        let groups = group_files(&[file("x.mp4", None), file("y.mp4", None)]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, "root");
        assert!(!groups[0].is_virtual);
    }

    #[test]
    fn test_mixed_root_and_folder() {
        let groups = group_files(&[file("x.mp4", None), file("y.mp4", Some("A"))]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "root");
        assert_eq!(groups[1].title, "A");
        assert!(groups.iter().all(|g| g.is_virtual));
    }

    #[test]
    fn test_primary_recomputed_per_group() {
        let mut a = file("x.mp4", Some("A"));
        a.is_primary = true;
        let groups = group_files(&[a, file("y.mp4", Some("B")), file("z.mp4", Some("B"))]);
        assert!(groups[0].files[0].is_primary);
        assert!(groups[1].files[0].is_primary);
        assert!(!groups[1].files[1].is_primary);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_files(&[]).is_empty());
    }
}
