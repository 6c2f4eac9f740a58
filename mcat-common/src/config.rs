//! Configuration loading and root folder resolution
//!
//! Every mcat service resolves its root folder (where `mcat.db` lives) in the
//! same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MCAT_ROOT_FOLDER`)
//! 3. `root_folder` key of the service's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal. Services warn and continue with
//! built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "MCAT_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "mcat.db";

/// Logging section shared by all service TOML files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the root folder from CLI argument, environment and TOML value
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_value: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/mcat (or /var/lib/mcat for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("mcat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mcat"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mcat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mcat"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mcat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mcat"))
    } else {
        PathBuf::from("./mcat_data")
    }
}

/// Default TOML config path for a service, e.g. `~/.config/mcat/mcat-rs.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mcat").join(format!("{}.toml", module_name)))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}

/// Load a TOML config file into `T`
///
/// Returns `T::default()` with a warning when the file does not exist.
/// A file that exists but fails to parse is a configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(
            "Config file not found: {} (using built-in defaults)",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let cli = PathBuf::from("/from/cli");
        let toml = PathBuf::from("/from/toml");
        let resolved = resolve_root_folder(Some(&cli), Some(&toml));
        assert_eq!(resolved, cli);
    }

    #[test]
    fn test_database_path_is_inside_root() {
        let root = PathBuf::from("/srv/mcat");
        assert_eq!(database_path(&root), PathBuf::from("/srv/mcat/mcat.db"));
    }

    #[test]
    fn test_logging_defaults_to_info() {
        assert_eq!(LoggingConfig::default().level, "info");
    }
}
