//! Access/refresh token storage and JWT claim decoding.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ApiError;

pub const ACCESS_KEY: &str = "access_token";
pub const REFRESH_KEY: &str = "refresh_token";

/// Key/value secret storage for the two tokens.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ApiError>;
    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), ApiError>;

    fn access_token(&self) -> Result<Option<String>, ApiError> {
        self.get(ACCESS_KEY)
    }

    fn refresh_token(&self) -> Result<Option<String>, ApiError> {
        self.get(REFRESH_KEY)
    }

    fn store_pair(&self, access: &str, refresh: &str) -> Result<(), ApiError> {
        self.set(ACCESS_KEY, access)?;
        self.set(REFRESH_KEY, refresh)
    }

    fn clear(&self) -> Result<(), ApiError> {
        self.delete(ACCESS_KEY)?;
        self.delete(REFRESH_KEY)
    }
}

/// Tokens in the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    const SERVICE: &'static str = "solosync";

    pub fn new() -> Self {
        Self::with_service(Self::SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, ApiError> {
        keyring::Entry::new(&self.service, key).map_err(|e| ApiError::TokenStore(e.to_string()))
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ApiError::TokenStore(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| ApiError::TokenStore(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), ApiError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ApiError::TokenStore(e.to_string())),
        }
    }
}

/// Process-local store, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        let store = Self::new();
        let mut values = store.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(ACCESS_KEY.to_string(), access.to_string());
        values.insert(REFRESH_KEY.to_string(), refresh.to_string());
        drop(values);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ApiError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ApiError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl Claims {
    /// Decode the payload segment of a JWT. The signature is not checked;
    /// the server does that.
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}

/// The logged-in user according to the stored access token.
///
/// An undecodable or expired token logs the user out: both tokens are
/// cleared and `None` is returned.
pub fn current_user(store: &dyn TokenStore) -> Result<Option<Claims>, ApiError> {
    let Some(access) = store.access_token()? else {
        return Ok(None);
    };
    match Claims::decode(&access) {
        Some(claims) if !claims.is_expired_at(Utc::now()) => Ok(Some(claims)),
        Some(_) => {
            info!("stored access token expired, logging out");
            store.clear()?;
            Ok(None)
        }
        None => {
            debug!("stored access token is not a JWT, logging out");
            store.clear()?;
            Ok(None)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Unsigned JWT with the given claims.
    pub fn jwt(username: &str, exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = serde_json::json!({"user_id": 1, "username": username, "exp": exp});
        let body = URL_SAFE_NO_PAD.encode(body.to_string());
        format!("{header}.{body}.sig")
    }
}
