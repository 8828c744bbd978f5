use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wakmeter_types::{LogFileRole, TrackerSettings};

pub const APP_NAME: &str = "wakmeter";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to store configuration: {0}")]
    Store(#[from] confy::ConfyError),
}

/// Application configuration, stored by confy as TOML under [`APP_NAME`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerSettings,
}

impl AppConfig {
    /// Load the stored configuration. A broken file logs a warning and yields defaults.
    pub fn load() -> Self {
        match confy::load(APP_NAME, None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    pub fn log_directory(&self) -> PathBuf {
        if self.tracker.log_directory.trim().is_empty() {
            default_log_directory()
        } else {
            PathBuf::from(&self.tracker.log_directory)
        }
    }

    pub fn data_directory(&self) -> PathBuf {
        if self.tracker.data_directory.trim().is_empty() {
            default_data_directory()
        } else {
            PathBuf::from(&self.tracker.data_directory)
        }
    }

    pub fn log_path(&self, role: LogFileRole) -> PathBuf {
        self.log_directory().join(role.default_file_name())
    }
}

/// Where the Ankama launcher writes the Wakfu client logs.
pub fn default_log_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_default()
        .join("zaap")
        .join("gamesLogs")
        .join("wakfu")
        .join("logs")
}

pub fn default_data_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Resolve a log file path, joining with the log directory if relative.
pub fn resolve_log_path(config: &AppConfig, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config.log_directory().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_directories_win() {
        let mut config = AppConfig::default();
        config.tracker.log_directory = "/games/wakfu/logs".into();
        config.tracker.data_directory = "/var/lib/wakmeter".into();

        assert_eq!(config.log_path(LogFileRole::Chat), Path::new("/games/wakfu/logs/wakfu_chat.log"));
        assert_eq!(config.data_directory(), Path::new("/var/lib/wakmeter"));
        assert_eq!(
            resolve_log_path(&config, Path::new("wakfu.log")),
            Path::new("/games/wakfu/logs/wakfu.log")
        );
    }

    #[test]
    fn test_defaults_point_at_launcher_logs() {
        let config = AppConfig::default();
        assert!(config.log_directory().ends_with("zaap/gamesLogs/wakfu/logs"));
        assert!(config.data_directory().ends_with(APP_NAME));
    }
}
