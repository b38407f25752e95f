use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

pub const DEFAULT_API_KEY: &str = "dev-api-key-change-me";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Embedded SQLite store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// One connection keeps SQLite writes strictly serialized.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            sqlx_logging: false,
        }
    }
}

/// JSON snapshot settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
    #[serde(default = "default_backup_interval")]
    pub interval_secs: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self { path: default_snapshot_path(), interval_secs: default_backup_interval() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }
fn default_body_limit() -> usize { 10 * 1024 * 1024 }
fn default_db_path() -> PathBuf { PathBuf::from("./data/database.sqlite") }
fn default_snapshot_path() -> PathBuf { PathBuf::from("./uploads/backup.json") }
fn default_max_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 30 }
fn default_backup_interval() -> u64 { 30 * 60 }

pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`) when present, fall back to defaults,
    /// then apply environment overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let path = config_path();
        let mut cfg = if Path::new(&path).exists() { load_from_file(&path)? } else { AppConfig::default() };
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Overlay values from the environment. `lookup` is injected so callers
    /// (and tests) can supply their own variable source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").or_else(|| lookup("SERVER_PORT")).and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(w) = lookup("TOKIO_WORKER_THREADS").and_then(|v| v.parse::<usize>().ok()) {
            self.server.worker_threads = Some(w);
        }
        if let Some(p) = lookup("DB_PATH") {
            self.storage.path = PathBuf::from(p);
        }
        if let Some(p) = lookup("BACKUP_PATH") {
            self.backup.path = PathBuf::from(p);
        }
        if let Some(secs) = lookup("BACKUP_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.backup.interval_secs = secs;
        }
        if let Some(key) = lookup("API_KEY") {
            self.auth.api_key = Some(key);
        }
        if let Some(fmt) = lookup("LOG_FORMAT") {
            self.logging.json = fmt.eq_ignore_ascii_case("json");
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.validate()?;
        self.backup.validate()?;
        self.auth.normalize();
        Ok(())
    }

    /// The configured API key, or the development fallback.
    pub fn api_key(&self) -> &str {
        self.auth.api_key.as_deref().unwrap_or(DEFAULT_API_KEY)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup.interval_secs)
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        if self.body_limit_bytes == 0 {
            self.body_limit_bytes = default_body_limit();
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(anyhow!("storage.path is empty"));
        }
        if self.max_connections == 0 {
            return Err(anyhow!("storage.max_connections must be >= 1"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("storage.connect_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }
}

impl BackupConfig {
    fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(anyhow!("backup.path is empty"));
        }
        if self.interval_secs == 0 {
            return Err(anyhow!("backup.interval_secs must be >= 1"));
        }
        Ok(())
    }
}

impl AuthConfig {
    fn normalize(&mut self) {
        if self.api_key.as_deref().map(str::trim).is_some_and(str::is_empty) {
            self.api_key = None;
        }
    }
}
