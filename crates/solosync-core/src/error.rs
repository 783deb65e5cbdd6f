//! Core error types for solosync-core.
//!
//! Errors split along the lines of what the caller can do about them:
//! load and configuration errors stop a session from starting, API errors
//! surface as status text, and resource errors (wake lock, speech, audio)
//! are logged and swallowed by the component that owns the resource.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for solosync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A session could not be started from the loaded routine
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Routine fetch failed
    #[error("{0}")]
    Load(#[from] LoadError),

    /// API call failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The routine cannot be played as configured (e.g. it has no steps).
    #[error("Cannot start: {0}")]
    Configuration(String),
}

/// Routine load failures. Not-found and network are kept apart so the
/// player can word its message accordingly.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Routine with ID {routine_id} not found or not assigned to you.")]
    NotFound { routine_id: u64 },

    #[error("Failed to load session details: {0}")]
    Network(String),

    #[error("Session expired, please log in again.")]
    AuthExpired,
}

/// HTTP API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No access token stored
    #[error("Not logged in")]
    NotAuthenticated,

    /// Refresh failed or no refresh token; the user has to log in again
    #[error("Session expired, please log in again")]
    AuthExpired,

    /// Request rejected with 401 after any refresh attempt
    #[error("Unauthorized")]
    Unauthorized,

    /// Server rejected the payload; field → messages
    #[error("{}", format_field_errors(.0))]
    Validation(BTreeMap<String, Vec<String>>),

    /// Any other non-success status
    #[error("API Error: {status}: {message}")]
    Status { status: u16, message: String },

    /// Could not reach the server
    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),

    /// Bad base URL or endpoint path
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Token storage failed
    #[error("Token storage error: {0}")]
    TokenStore(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            ApiError::Validation(_) => Some(400),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Renders `{field: [errors]}` as one `field: e1, e2` line per field.
pub fn format_field_errors(errors: &BTreeMap<String, Vec<String>>) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// No home directory to put the config under
    #[error("Cannot determine configuration directory")]
    NoConfigDir,
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Out of bounds
    #[error("Value {value} out of range for '{field}' ({min}-{max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures of optional platform resources. Never fatal to a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("wake lock not supported on this platform")]
    WakeLockUnsupported,

    #[error("wake lock request failed: {0}")]
    WakeLock(String),

    #[error("speech synthesis unavailable")]
    SpeechUnavailable,

    #[error("speech failed: {0}")]
    Speech(String),

    #[error("audio output failed: {0}")]
    Audio(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
