//! SoloSync API access: routines, session logs and authentication.

pub mod client;
pub mod refresh;
pub mod tokens;
pub mod types;

pub use client::ApiClient;
pub use refresh::RefreshGate;
pub use tokens::{current_user, Claims, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use types::{LoggedMetric, MetricEntry, SessionLogPayload, SessionLogRecord};
