//! Default paths for playwarden components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/playwarden/config.toml` or `~/.config/playwarden/config.toml`
//! - Data: `$XDG_DATA_HOME/playwarden` or `~/.local/share/playwarden`
//! - Ledger: `<data dir>/time_log.txt`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const PLAYWARDEN_CONFIG_ENV: &str = "PLAYWARDEN_CONFIG";

/// Environment variable for overriding the data directory
pub const PLAYWARDEN_DATA_DIR_ENV: &str = "PLAYWARDEN_DATA_DIR";

/// Default usage ledger filename within the data directory
pub const DEFAULT_LEDGER_FILENAME: &str = "time_log.txt";

/// Application subdirectory name
const APP_DIR: &str = "playwarden";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$PLAYWARDEN_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/playwarden/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/playwarden/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(PLAYWARDEN_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking PLAYWARDEN_CONFIG.
pub fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the data directory without checking PLAYWARDEN_DATA_DIR.
///
/// Order of precedence:
/// 1. `$XDG_DATA_HOME/playwarden` (if XDG_DATA_HOME is set)
/// 2. `~/.local/share/playwarden` (fallback)
///
/// The daemon applies `$PLAYWARDEN_DATA_DIR` on top of the loaded config.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_contains_playwarden() {
        let path = config_path_without_env();
        assert!(path.to_string_lossy().contains("playwarden"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn data_dir_contains_playwarden() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("playwarden"));
    }
}
