//! Application paths for config and data.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory (database and credential file).
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the pbxdash application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("ru", "onlinepbx", "pbxdash") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
            Self {
                config: home.join(".config/pbxdash"),
                data: home.join(".local/share/pbxdash"),
            }
        }
    }

    /// Default config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default call history database.
    #[must_use]
    pub fn db_file(&self) -> PathBuf {
        self.data.join("calls_history.sqlite")
    }

    /// Default persisted credential file.
    #[must_use]
    pub fn key_file(&self) -> PathBuf {
        self.data.join("pbx_api_key.json")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
