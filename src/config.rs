use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendType,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Which storage adapter backs the gallery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_db_path")]
    pub db_path: PathBuf,
}

fn default_local_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portfolio-gallery")
        .join("gallery.db")
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            db_path: default_local_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,

    /// Public (anon) API key sent with every request
    #[serde(default)]
    pub anon_key: String,

    /// Upper bound for any single request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,

    /// Seconds between change-feed polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_realtime_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Shared admin password. Prototype gate only, not real authentication.
    #[serde(default = "default_admin_password")]
    pub password: String,
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: default_admin_password(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            local: LocalConfig::default(),
            remote: RemoteConfig::default(),
            realtime: RealtimeConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config.with_env_overrides())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Environment variables win over the file for deployment secrets.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PORTFOLIO_SUPABASE_URL") {
            self.remote.url = url;
        }
        if let Ok(key) = std::env::var("PORTFOLIO_SUPABASE_ANON_KEY") {
            self.remote.anon_key = key;
        }
        if let Ok(password) = std::env::var("PORTFOLIO_ADMIN_PASSWORD") {
            self.admin.password = password;
        }
        self
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portfolio-gallery")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            backend = "remote"

            [remote]
            url = "https://example.supabase.co"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendType::Remote);
        assert_eq!(config.remote.url, "https://example.supabase.co");
        assert_eq!(config.remote.timeout_secs, 30);
        assert!(config.realtime.enabled);
        assert_eq!(config.realtime.poll_interval_secs, 5);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.realtime.poll_interval_secs = 12;
        config.local.db_path = dir.path().join("gallery.db");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.realtime.poll_interval_secs, 12);
        assert_eq!(loaded.local.db_path, dir.path().join("gallery.db"));
        assert_eq!(loaded.backend, BackendType::Local);
    }
}
