//! TOML-based application configuration.
//!
//! Stores:
//! - API location
//! - The persisted player toggles (announcements, audio cues)
//! - Cue timing and tone constants
//! - Speech and wake lock platform commands
//!
//! Configuration is stored at `~/.config/solosync/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};

/// API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Player toggles persisted across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Speak drill names at phase changes.
    #[serde(default)]
    pub announcements_enabled: bool,
    /// Countdown and go tones.
    #[serde(default = "default_true")]
    pub audio_cues_enabled: bool,
}

/// Cue timing and tones. Product choices, hence configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueConfig {
    /// Lead-in countdown before the first drill.
    #[serde(default = "default_prep_secs")]
    pub prep_secs: u64,
    /// Warning tones during the last N seconds of an activity.
    #[serde(default = "default_warning_secs")]
    pub activity_warning_secs: u64,
    /// Warning tones during the last N seconds of a rest.
    #[serde(default = "default_warning_secs")]
    pub rest_warning_secs: u64,
    /// Remaining seconds of a rest at which the go tone replaces the warning.
    #[serde(default = "default_rest_go_secs")]
    pub rest_go_secs: u64,
    #[serde(default = "default_warning_tone_hz")]
    pub warning_tone_hz: f32,
    #[serde(default = "default_warning_tone_ms")]
    pub warning_tone_ms: u64,
    #[serde(default = "default_go_tone_hz")]
    pub go_tone_hz: f32,
    #[serde(default = "default_go_tone_ms")]
    pub go_tone_ms: u64,
    /// Delay before phase-change announcements are spoken.
    #[serde(default)]
    pub announce_delay_ms: u64,
}

/// Speech synthesis command. `None` picks the platform default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Screen wake lock command. `None` picks the platform default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeLockConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/solosync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub cues: CueConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub wake_lock: WakeLockConfig,
    /// Where this config was loaded from; `save()` writes back there.
    #[serde(skip)]
    path: Option<PathBuf>,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8000/api/".into()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_prep_secs() -> u64 {
    3
}
fn default_warning_secs() -> u64 {
    3
}
fn default_rest_go_secs() -> u64 {
    1
}
fn default_warning_tone_hz() -> f32 {
    880.0
}
fn default_warning_tone_ms() -> u64 {
    150
}
fn default_go_tone_hz() -> f32 {
    1320.0
}
fn default_go_tone_ms() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            announcements_enabled: false,
            audio_cues_enabled: true,
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            prep_secs: default_prep_secs(),
            activity_warning_secs: default_warning_secs(),
            rest_warning_secs: default_warning_secs(),
            rest_go_secs: default_rest_go_secs(),
            warning_tone_hz: default_warning_tone_hz(),
            warning_tone_ms: default_warning_tone_ms(),
            go_tone_hz: default_go_tone_hz(),
            go_tone_ms: default_go_tone_ms(),
            announce_delay_ms: 0,
        }
    }
}

impl Default for WakeLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            preferences: Preferences::default(),
            cues: CueConfig::default(),
            speech: SpeechConfig::default(),
            wake_lock: WakeLockConfig::default(),
            path: None,
        }
    }
}

impl Config {
    /// Persisted key of the announcements toggle.
    pub const ANNOUNCEMENTS_KEY: &'static str = "preferences.announcements_enabled";
    /// Persisted key of the audio cue toggle.
    pub const AUDIO_CUES_KEY: &'static str = "preferences.audio_cues_enabled";

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else if let Ok(n) = value.parse::<f64>() {
                    serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as number")));
                }
            }
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            // Optional strings are stored as null until first set.
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Default config file location.
    pub fn default_path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.path = Some(path.to_path_buf());
                tracing::debug!(path = %path.display(), "config loaded");
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self {
                    path: Some(path.to_path_buf()),
                    ..Self::default()
                };
                cfg.save()?;
                tracing::debug!(path = %path.display(), "default config written");
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the path this config was loaded from (or the default path).
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => Self::default_path()?,
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let path = self.path.take();
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.path = path;
        self.save()
    }

    /// Restore every setting to its default and persist.
    pub fn reset(&mut self) -> Result<()> {
        let path = self.path.take();
        *self = Self {
            path,
            ..Self::default()
        };
        self.save()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist new toggle values under their fixed keys.
    pub fn store_preferences(&mut self, preferences: Preferences) -> Result<()> {
        self.preferences = preferences;
        self.save()
    }
}
