mod config;

pub use config::{ApiConfig, Config, CueConfig, Preferences, SpeechConfig, WakeLockConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/solosync[-dev]/` based on SOLOSYNC_ENV.
///
/// Set SOLOSYNC_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or(ConfigError::NoConfigDir)?;

    let env = std::env::var("SOLOSYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("solosync-dev")
    } else {
        base_dir.join("solosync")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::SaveFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
