// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::warn;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 目录存储配置
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 解析队列配置
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

/// 目录存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

/// 解析队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 单个解析任务的超时（秒）
    ///
    /// 队列全局只有一个在途任务，超时兜底避免上游挂起时长期占住队列
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3880
}

fn default_db_path() -> PathBuf {
    PathBuf::from("db/app.db")
}

fn default_job_timeout_secs() -> u64 {
    120
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            resolver: ResolverConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件加载，失败时回退默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("解析配置文件失败: {}, 使用默认配置", e);
                    AppConfig::default()
                }
            },
            Err(_) => AppConfig::default(),
        }
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("创建配置目录失败")?;
        }
        fs::write(path, content).await.context("写入配置文件失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3880);
        assert_eq!(config.catalog.db_path, PathBuf::from("db/app.db"));
        assert_eq!(config.resolver.job_timeout_secs, 120);
        assert!(config.log.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.log.retention_days, 7);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        let path_str = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.server.port = 4567;
        config.save_to_file(path_str).await.unwrap();

        let loaded = AppConfig::load_or_default(path_str).await;
        assert_eq!(loaded.server.port, 4567);
    }
}
