//! Configuration for mcat-rs (Regional Sync)
//!
//! Bootstrap settings come from a TOML file, overridden by command-line
//! arguments and environment variables in `main`. A missing file yields
//! built-in defaults.
//!
//! ```toml
//! root_folder = "/srv/mcat"
//! port = 5810
//!
//! [logging]
//! level = "info"
//!
//! [regional_sync]
//! enabled = true
//! source_url = "https://registry.example.org/api/regionals"
//! interval_secs = 300
//! fetch_timeout_secs = 10
//! trust_empty_source = true
//! requests_per_minute = 30
//! ```

use crate::sync::SyncSettings;
use mcat_common::config::LoggingConfig;
use mcat_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Module name used for config file lookup and health responses
pub const MODULE_NAME: &str = "mcat-rs";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub regional_sync: RegionalSyncConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            regional_sync: RegionalSyncConfig::default(),
        }
    }
}

/// `[regional_sync]` section
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalSyncConfig {
    /// Run the periodic scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Authoritative regional list endpoint
    #[serde(default)]
    pub source_url: Option<String>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Accept an empty source list as "everything was removed"
    #[serde(default = "default_true")]
    pub trust_empty_source: bool,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for RegionalSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: None,
            interval_secs: default_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            trust_empty_source: true,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_port() -> u16 {
    5810
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_requests_per_minute() -> u32 {
    30
}

impl RegionalSyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::Config("regional_sync.interval_secs must be > 0".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "regional_sync.fetch_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.requests_per_minute == 0 {
            return Err(Error::Config(
                "regional_sync.requests_per_minute must be > 0".to_string(),
            ));
        }
        if let Some(url) = &self.source_url {
            if url.trim().is_empty() {
                return Err(Error::Config("regional_sync.source_url is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            fetch_timeout: self.fetch_timeout(),
            trust_empty_source: self.trust_empty_source,
        }
    }
}

/// Load and validate the TOML config
///
/// `path` defaults to `~/.config/mcat/mcat-rs.toml`.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let config: TomlConfig = match path
        .map(Path::to_path_buf)
        .or_else(|| mcat_common::config::default_config_path(MODULE_NAME))
    {
        Some(path) => mcat_common::config::load_toml_config(&path)?,
        None => TomlConfig::default(),
    };

    config.regional_sync.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5810);
        assert!(config.regional_sync.enabled);
        assert!(config.regional_sync.trust_empty_source);
        assert_eq!(config.regional_sync.interval(), Duration::from_secs(300));
        assert!(config.regional_sync.source_url.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mcat-rs.toml");
        std::fs::write(
            &path,
            "[regional_sync]\nsource_url = \"http://localhost:9000/regionals\"\ntrust_empty_source = false\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.port, 5810);
        assert_eq!(
            config.regional_sync.source_url.as_deref(),
            Some("http://localhost:9000/regionals")
        );
        assert!(!config.regional_sync.sync_settings().trust_empty_source);
        assert_eq!(config.regional_sync.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mcat-rs.toml");
        std::fs::write(&path, "[regional_sync]\ninterval_secs = 0\n").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.port, 5810);
    }
}
