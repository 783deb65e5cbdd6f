//! Request and response bodies of the SoloSync API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Body of `POST solo/session-logs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogPayload {
    pub routine_id: u64,
    /// 1 (very easy) to 5 (very hard).
    pub physical_difficulty: u8,
    pub notes: String,
    pub logged_metrics: Vec<MetricEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub drill_id: u64,
    pub metric_name: String,
    pub metric_value: String,
}

/// A logged session as returned by `GET solo/session-logs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLogRecord {
    pub id: u64,
    #[serde(default)]
    pub player_username: Option<String>,
    #[serde(default)]
    pub routine_name: Option<String>,
    #[serde(default)]
    pub routine_difficulty_display: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub physical_difficulty: Option<u8>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub logged_metrics: Vec<LoggedMetric>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMetric {
    #[serde(default)]
    pub drill_name: Option<String>,
    pub metric_name: String,
    /// Free-form; the server echoes whatever was submitted.
    pub metric_value: serde_json::Value,
}

/// List endpoints answer either with a bare array or a paginated page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    List(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::List(items) => items,
        }
    }
}
