//! Path utilities for finding data and settings locations

use directories::ProjectDirs;
use std::env;
use std::path::PathBuf;

/// Environment variable that overrides the settings file location
pub const CONFIG_PATH_ENV: &str = "HAIKU_FISHING_CONFIG_PATH";

const SETTINGS_FILE: &str = "macro_settings.json";

/// Returns the folder where logs and session files are written.
/// Uses the executable directory when a `config` folder sits next to it,
/// the current directory otherwise.
pub fn get_data_dir() -> PathBuf {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            if parent.join("config").exists() {
                return parent.to_path_buf();
            }
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Location of the settings document.
///
/// Resolution order: `HAIKU_FISHING_CONFIG_PATH`, the per-user config directory,
/// then the data directory.
pub fn get_settings_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    match ProjectDirs::from("", "", "Haiku Fishing") {
        Some(dirs) => dirs.config_dir().join(SETTINGS_FILE),
        None => get_data_dir().join(SETTINGS_FILE),
    }
}
