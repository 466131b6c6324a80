// 目录 SQLite 存储
//
// 容器、文件与设置三张表。文件表以指纹唯一索引去重，
// 重复预览同一分享时 INSERT OR IGNORE 保证幂等。

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::catalog::types::{CatalogFile, Container, ContainerStatus};
use crate::preview::NormalizedFile;
use crate::resolver::types::ResolvedFileLinks;

/// 目录存储管理器
pub struct CatalogStore {
    /// SQLite 连接
    conn: Mutex<Connection>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl CatalogStore {
    /// 打开（或创建）数据库并初始化表结构
    pub fn new(db_path: &Path) -> Result<Self> {
        // 确保父目录存在
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;

        Ok(store)
    }

    /// 初始化数据库表
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS containers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                source TEXT,
                title TEXT,
                is_virtual INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'idle',
                error_message TEXT,
                previewed_at INTEGER,
                resolved_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                container_id INTEGER NOT NULL,
                provider TEXT NOT NULL,
                fs_id TEXT,
                local_path TEXT,
                name TEXT,
                original_path TEXT,
                folder_name TEXT,
                size_bytes INTEGER,
                duration REAL,
                mime_type TEXT,
                thumbnail_url TEXT,
                is_primary INTEGER NOT NULL DEFAULT 0,
                is_playable INTEGER NOT NULL DEFAULT 0,
                file_index INTEGER NOT NULL DEFAULT 0,
                fingerprint TEXT,
                stream_url TEXT,
                fast_stream_url TEXT,
                download_url TEXT,
                auth_fetched_at INTEGER,
                last_position_secs REAL,
                watch_progress_percent REAL,
                last_watched_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        // 指纹唯一索引：同一内容目录内只保留一行（NULL 指纹不受约束）
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_files_fingerprint ON files(fingerprint)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_container ON files(container_id, file_index)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(())
    }

    // ============================================
    // 容器操作
    // ============================================

    /// 创建容器，返回 id
    pub fn create_container(
        &self,
        container_type: &str,
        source: Option<&str>,
        title: Option<&str>,
        is_virtual: bool,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let now = now_ms();
        conn.execute(
            "INSERT INTO containers (type, source, title, is_virtual, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![container_type, source, title, is_virtual as i64, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按创建时间倒序列出所有容器
    pub fn list_containers(&self) -> Result<Vec<Container>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, type, source, title, is_virtual, status, error_message,
                    previewed_at, resolved_at, created_at, updated_at
             FROM containers ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], container_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 按 id 获取容器
    pub fn get_container(&self, id: i64) -> Result<Option<Container>> {
        let conn = self.conn.lock();
        let container = conn
            .query_row(
                "SELECT id, type, source, title, is_virtual, status, error_message,
                        previewed_at, resolved_at, created_at, updated_at
                 FROM containers WHERE id = ?1",
                params![id],
                container_from_row,
            )
            .optional()?;
        Ok(container)
    }

    /// 重命名容器
    pub fn rename_container(&self, id: i64, title: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE containers SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now_ms(), id],
        )?;
        Ok(changed > 0)
    }

    /// 删除容器及其文件
    pub fn delete_container(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM files WHERE container_id = ?1", params![id])?;
        let changed = conn.execute("DELETE FROM containers WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// 重置容器到 idle（重新抓取前调用）
    pub fn reset_container(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE containers SET status = 'idle', error_message = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now_ms(), id],
        )?;
        Ok(changed > 0)
    }

    /// 更新容器标题
    pub fn set_container_title(&self, id: i64, title: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE containers SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now_ms(), id],
        )?;
        Ok(())
    }

    /// 标记预览中
    pub fn mark_previewing(&self, id: i64) -> Result<()> {
        self.set_status(id, ContainerStatus::Previewing)
    }

    /// 标记预览成功并记录时间
    pub fn mark_previewed(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_ms();
        conn.execute(
            "UPDATE containers SET status = 'previewed', error_message = NULL,
                    previewed_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    /// 标记解析中
    pub fn mark_resolving(&self, id: i64) -> Result<()> {
        self.set_status(id, ContainerStatus::Resolving)
    }

    /// 标记解析成功并记录时间
    pub fn mark_resolved(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let now = now_ms();
        conn.execute(
            "UPDATE containers SET status = 'resolved', error_message = NULL,
                    resolved_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    /// 标记失败并记录原因（失败对外可见，不必翻日志）
    pub fn mark_error(&self, id: i64, message: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE containers SET status = 'error', error_message = ?1, updated_at = ?2
             WHERE id = ?3",
            params![message, now_ms(), id],
        )?;
        Ok(())
    }

    fn set_status(&self, id: i64, status: ContainerStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE containers SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_ms(), id],
        )?;
        Ok(())
    }

    // ============================================
    // 文件操作
    // ============================================

    /// 批量写入规范化文件，返回实际插入的行数
    ///
    /// 指纹已存在的行被静默忽略（重复预览幂等）
    pub fn insert_files(&self, container_id: i64, files: &[NormalizedFile]) -> Result<usize> {
        let conn = self.conn.lock();
        let now = now_ms();
        let mut inserted = 0;

        let mut stmt = conn.prepare(
            r#"
            INSERT OR IGNORE INTO files (
                container_id, provider, fs_id, local_path, original_path,
                name, folder_name, size_bytes, mime_type, thumbnail_url,
                is_primary, is_playable, file_index, fingerprint,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )?;

        for (idx, file) in files.iter().enumerate() {
            let changed = stmt.execute(params![
                container_id,
                file.provider,
                file.provider_file_id,
                file.original_path,
                file.name,
                file.folder_name,
                file.size_bytes.map(|s| s as i64),
                file.mime_type,
                file.thumbnail_url,
                (idx == 0) as i64,
                file.is_playable as i64,
                idx as i64,
                file.fingerprint,
                now,
            ])?;
            inserted += changed;
        }

        debug!(
            "写入文件: container_id={}, 提交 {} 行, 实际插入 {} 行",
            container_id,
            files.len(),
            inserted
        );
        Ok(inserted)
    }

    /// 容器内文件（按 file_index 排序）
    pub fn files_for_container(&self, container_id: i64) -> Result<Vec<CatalogFile>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM files WHERE container_id = ?1 ORDER BY file_index",
            FILE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![container_id], file_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 按 id 获取文件
    pub fn get_file(&self, id: i64) -> Result<Option<CatalogFile>> {
        let conn = self.conn.lock();
        let file = conn
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                params![id],
                file_from_row,
            )
            .optional()?;
        Ok(file)
    }

    /// 按 (container_id, fs_id) 写入解析出的直链
    ///
    /// 返回是否更新到行；表中不存在的 fs_id 返回 false，由调用方跳过
    pub fn update_resolved_links(
        &self,
        container_id: i64,
        fs_id: &str,
        links: &ResolvedFileLinks,
        fetched_at: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE files SET stream_url = ?1, fast_stream_url = ?2, download_url = ?3,
                    auth_fetched_at = ?4, updated_at = ?5
             WHERE container_id = ?6 AND fs_id = ?7",
            params![
                links.stream_url,
                links.fast_stream_url,
                links.download_url,
                fetched_at,
                now_ms(),
                container_id,
                fs_id
            ],
        )?;
        Ok(changed > 0)
    }

    /// 容器内最近一次直链获取时间（无文件或未解析时为 None）
    pub fn latest_auth_fetched_at(&self, container_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let ts: Option<i64> = conn.query_row(
            "SELECT MAX(auth_fetched_at) FROM files WHERE container_id = ?1",
            params![container_id],
            |row| row.get(0),
        )?;
        Ok(ts)
    }

    /// 更新播放进度
    pub fn update_watch_progress(&self, file_id: i64, position: f64, progress: f64) -> Result<bool> {
        let conn = self.conn.lock();
        let now = now_ms();
        let changed = conn.execute(
            "UPDATE files SET last_position_secs = ?1, watch_progress_percent = ?2,
                    last_watched_at = ?3, updated_at = ?3
             WHERE id = ?4",
            params![position, progress, now, file_id],
        )?;
        Ok(changed > 0)
    }

    /// 本地文件行（id, local_path, is_playable），存在性核对用
    pub fn local_files(&self) -> Result<Vec<(i64, Option<String>, bool)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, local_path, is_playable FROM files WHERE provider = 'local'")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)? != 0,
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 设置文件可播放标记
    pub fn set_playable(&self, file_id: i64, playable: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE files SET is_playable = ?1, updated_at = ?2 WHERE id = ?3",
            params![playable as i64, now_ms(), file_id],
        )?;
        Ok(())
    }

    // ============================================
    // 设置操作
    // ============================================

    /// 读取设置值（JSON 文本）
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入设置值
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// 全部设置
    pub fn all_settings(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

const FILE_COLUMNS: &str = "id, container_id, provider, fs_id, local_path, name, original_path, \
     folder_name, size_bytes, duration, mime_type, thumbnail_url, is_primary, is_playable, \
     file_index, fingerprint, stream_url, fast_stream_url, download_url, auth_fetched_at, \
     last_position_secs, watch_progress_percent, last_watched_at, created_at, updated_at";

fn container_from_row(row: &Row<'_>) -> rusqlite::Result<Container> {
    Ok(Container {
        id: row.get(0)?,
        container_type: row.get(1)?,
        source: row.get(2)?,
        title: row.get(3)?,
        is_virtual: row.get::<_, i64>(4)? != 0,
        status: ContainerStatus::parse(&row.get::<_, String>(5)?),
        error_message: row.get(6)?,
        previewed_at: row.get(7)?,
        resolved_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogFile> {
    Ok(CatalogFile {
        id: row.get(0)?,
        container_id: row.get(1)?,
        provider: row.get(2)?,
        fs_id: row.get(3)?,
        local_path: row.get(4)?,
        name: row.get(5)?,
        original_path: row.get(6)?,
        folder_name: row.get(7)?,
        size_bytes: row.get(8)?,
        duration: row.get(9)?,
        mime_type: row.get(10)?,
        thumbnail_url: row.get(11)?,
        is_primary: row.get::<_, i64>(12)? != 0,
        is_playable: row.get::<_, i64>(13)? != 0,
        file_index: row.get(14)?,
        fingerprint: row.get(15)?,
        stream_url: row.get(16)?,
        fast_stream_url: row.get(17)?,
        download_url: row.get(18)?,
        auth_fetched_at: row.get(19)?,
        last_position_secs: row.get(20)?,
        watch_progress_percent: row.get(21)?,
        last_watched_at: row.get(22)?,
        created_at: row.get(23)?,
        updated_at: row.get(24)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::ContainerStatus;

    fn test_store() -> (tempfile::TempDir, CatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(&dir.path().join("app.db")).unwrap();
        (dir, store)
    }

    fn normalized(name: &str, fingerprint: &str) -> NormalizedFile {
        NormalizedFile {
            provider: "terabox".to_string(),
            provider_file_id: format!("id-{}", name),
            name: name.to_string(),
            original_path: Some(format!("/{}", name)),
            folder_name: None,
            size_bytes: Some(1024),
            size_human: Some("1.00 KB".to_string()),
            mime_type: Some("video/mp4".to_string()),
            thumbnail_url: None,
            is_playable: true,
            is_primary: false,
            fingerprint: fingerprint.to_string(),
        }
    }

    #[test]
    fn test_container_lifecycle() {
        let (_dir, store) = test_store();

        let id = store
            .create_container("terabox", Some("https://terabox.com/s/1abc"), None, false)
            .unwrap();

        let container = store.get_container(id).unwrap().unwrap();
        assert_eq!(container.status, ContainerStatus::Idle);
        assert!(!container.is_virtual);

        store.mark_previewing(id).unwrap();
        assert_eq!(
            store.get_container(id).unwrap().unwrap().status,
            ContainerStatus::Previewing
        );

        store.mark_previewed(id).unwrap();
        let container = store.get_container(id).unwrap().unwrap();
        assert_eq!(container.status, ContainerStatus::Previewed);
        assert!(container.previewed_at.is_some());

        store.mark_error(id, "鉴权被拒绝").unwrap();
        let container = store.get_container(id).unwrap().unwrap();
        assert_eq!(container.status, ContainerStatus::Error);
        assert_eq!(container.error_message.as_deref(), Some("鉴权被拒绝"));

        store.reset_container(id).unwrap();
        let container = store.get_container(id).unwrap().unwrap();
        assert_eq!(container.status, ContainerStatus::Idle);
        assert!(container.error_message.is_none());

        assert!(store.delete_container(id).unwrap());
        assert!(store.get_container(id).unwrap().is_none());
    }

    #[test]
    fn test_insert_files_is_idempotent_by_fingerprint() {
        let (_dir, store) = test_store();
        let id = store.create_container("terabox", None, None, false).unwrap();

        let files = vec![normalized("a.mp4", "md5:aaa"), normalized("b.mp4", "md5:bbb")];

        assert_eq!(store.insert_files(id, &files).unwrap(), 2);
        // 同一批再插一遍：指纹全部重复，行数不变
        assert_eq!(store.insert_files(id, &files).unwrap(), 0);
        assert_eq!(store.files_for_container(id).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_marks_first_file_primary() {
        let (_dir, store) = test_store();
        let id = store.create_container("terabox", None, None, false).unwrap();
        store
            .insert_files(
                id,
                &[normalized("a.mp4", "md5:a"), normalized("b.mp4", "md5:b")],
            )
            .unwrap();

        let files = store.files_for_container(id).unwrap();
        assert!(files[0].is_primary);
        assert!(!files[1].is_primary);
        assert_eq!(files[0].file_index, 0);
        assert_eq!(files[1].file_index, 1);
    }

    #[test]
    fn test_resolved_link_update_and_staleness_source() {
        let (_dir, store) = test_store();
        let id = store.create_container("terabox", None, None, false).unwrap();
        store.insert_files(id, &[normalized("a.mp4", "md5:a")]).unwrap();

        assert_eq!(store.latest_auth_fetched_at(id).unwrap(), None);

        let links = ResolvedFileLinks {
            stream_url: Some("https://d.terabox.app/file/xyz".to_string()),
            fast_stream_url: Some("{}".to_string()),
            download_url: Some("https://d.terabox.app/file/xyz".to_string()),
        };

        assert!(store
            .update_resolved_links(id, "id-a.mp4", &links, 1_700_000_000_000)
            .unwrap());
        // 表中不存在的 fs_id 静默跳过
        assert!(!store
            .update_resolved_links(id, "missing", &links, 1_700_000_000_000)
            .unwrap());

        assert_eq!(
            store.latest_auth_fetched_at(id).unwrap(),
            Some(1_700_000_000_000)
        );

        let file = &store.files_for_container(id).unwrap()[0];
        assert_eq!(
            file.stream_url.as_deref(),
            Some("https://d.terabox.app/file/xyz")
        );
    }

    #[test]
    fn test_fingerprint_unique_across_containers() {
        let (_dir, store) = test_store();
        let c1 = store.create_container("terabox", None, None, false).unwrap();
        let c2 = store.create_container("terabox", None, None, false).unwrap();

        store.insert_files(c1, &[normalized("a.mp4", "md5:same")]).unwrap();
        // 相同内容出现在另一条分享里：唯一指纹索引保证目录级去重
        assert_eq!(
            store.insert_files(c2, &[normalized("a.mp4", "md5:same")]).unwrap(),
            0
        );
        assert!(store.files_for_container(c2).unwrap().is_empty());
    }

    #[test]
    fn test_settings_roundtrip() {
        let (_dir, store) = test_store();
        assert_eq!(store.get_setting("terabox_auth").unwrap(), None);

        store.set_setting("terabox_auth", r#"{"jsToken":"x"}"#).unwrap();
        assert_eq!(
            store.get_setting("terabox_auth").unwrap().as_deref(),
            Some(r#"{"jsToken":"x"}"#)
        );

        store.set_setting("terabox_auth", r#"{"jsToken":"y"}"#).unwrap();
        assert_eq!(
            store.get_setting("terabox_auth").unwrap().as_deref(),
            Some(r#"{"jsToken":"y"}"#)
        );

        assert_eq!(store.all_settings().unwrap().len(), 1);
    }

    #[test]
    fn test_watch_progress() {
        let (_dir, store) = test_store();
        let id = store.create_container("terabox", None, None, false).unwrap();
        store.insert_files(id, &[normalized("a.mp4", "md5:a")]).unwrap();
        let file_id = store.files_for_container(id).unwrap()[0].id;

        assert!(store.update_watch_progress(file_id, 120.5, 42.0).unwrap());
        assert!(!store.update_watch_progress(9999, 0.0, 0.0).unwrap());

        let file = store.get_file(file_id).unwrap().unwrap();
        assert_eq!(file.last_position_secs, Some(120.5));
        assert_eq!(file.watch_progress_percent, Some(42.0));
        assert!(file.last_watched_at.is_some());
    }
}
