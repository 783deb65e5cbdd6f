//! HTTP client for the SoloSync API.
//!
//! Every authenticated call carries the stored access token. A 401 triggers
//! one refresh through the shared [`RefreshGate`] and a single replay with
//! the new token; the refresh endpoint itself never goes through this path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::refresh::RefreshGate;
use super::tokens::{Claims, TokenStore};
use super::types::{
    Listing, LoginRequest, RefreshRequest, RefreshResponse, SessionLogPayload, SessionLogRecord,
    TokenResponse,
};
use crate::error::{ApiError, LoadError};
use crate::routine::{Routine, RoutineSummary};
use crate::storage::ApiConfig;

const TOKEN_PATH: &str = "token/";
const REFRESH_PATH: &str = "token/refresh/";
const ROUTINES_PATH: &str = "solo/assigned-routines/";
const SESSION_LOGS_PATH: &str = "solo/session-logs/";

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    tokens: Arc<dyn TokenStore>,
    gate: Arc<RefreshGate>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(&base)?,
            tokens,
            gate: Arc::new(RefreshGate::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Exchange credentials for a token pair and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<Claims>, ApiError> {
        let resp = self
            .http
            .post(self.endpoint(TOKEN_PATH)?)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let pair: TokenResponse = read_json(resp).await?;
        self.tokens.store_pair(&pair.access, &pair.refresh)?;
        info!(username, "logged in");
        Ok(Claims::decode(&pair.access))
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.clear()?;
        info!("logged out");
        Ok(())
    }

    // ── Routines ─────────────────────────────────────────────────────

    pub async fn list_routines(&self) -> Result<Vec<RoutineSummary>, ApiError> {
        let url = self.endpoint(ROUTINES_PATH)?;
        let resp = self.send_authed(|http| http.get(url.clone())).await?;
        let listing: Listing<RoutineSummary> = read_json(resp).await?;
        Ok(listing.into_vec())
    }

    /// Load one assigned routine with its steps in order.
    pub async fn fetch_routine(&self, routine_id: u64) -> Result<Routine, LoadError> {
        let result: Result<Routine, ApiError> = async {
            let url = self.endpoint(&format!("{ROUTINES_PATH}{routine_id}/"))?;
            let resp = self.send_authed(|http| http.get(url.clone())).await?;
            read_json::<Routine>(resp).await
        }
        .await;

        match result {
            Ok(mut routine) => {
                routine.normalize();
                debug!(routine_id, steps = routine.step_count(), "routine loaded");
                Ok(routine)
            }
            Err(e) => {
                warn!(routine_id, "failed to fetch routine: {e}");
                Err(match e {
                    ApiError::Status { status: 404, .. } => LoadError::NotFound { routine_id },
                    ApiError::AuthExpired | ApiError::NotAuthenticated => LoadError::AuthExpired,
                    other => LoadError::Network(other.to_string()),
                })
            }
        }
    }

    // ── Session logs ─────────────────────────────────────────────────

    pub async fn submit_log(&self, payload: &SessionLogPayload) -> Result<(), ApiError> {
        let url = self.endpoint(SESSION_LOGS_PATH)?;
        let resp = self
            .send_authed(|http| http.post(url.clone()).json(payload))
            .await?;
        check_status(resp).await?;
        info!(routine_id = payload.routine_id, "session log submitted");
        Ok(())
    }

    pub async fn list_session_logs(&self) -> Result<Vec<SessionLogRecord>, ApiError> {
        let url = self.endpoint(SESSION_LOGS_PATH)?;
        let resp = self.send_authed(|http| http.get(url.clone())).await?;
        let listing: Listing<SessionLogRecord> = read_json(resp).await?;
        Ok(listing.into_vec())
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    /// Send with the bearer token; on 401 refresh once and replay.
    async fn send_authed<B>(&self, build: B) -> Result<Response, ApiError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        let token = self
            .tokens
            .access_token()?
            .ok_or(ApiError::NotAuthenticated)?;
        let resp = build(&self.http).bearer_auth(&token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(url = %resp.url(), "401, refreshing access token");
        let token = self.refresh_access().await?;
        let resp = build(&self.http).bearer_auth(&token).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Ok(resp)
    }

    /// New access token via the gate. Any failure logs the user out.
    async fn refresh_access(&self) -> Result<String, ApiError> {
        let result = self.gate.refresh(|| self.request_refresh()).await;
        match result {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!("token refresh failed, logging out: {e}");
                self.tokens.clear()?;
                Err(ApiError::AuthExpired)
            }
        }
    }

    async fn request_refresh(&self) -> Result<String, ApiError> {
        let refresh = self
            .tokens
            .refresh_token()?
            .ok_or(ApiError::AuthExpired)?;
        let resp = self
            .http
            .post(self.endpoint(REFRESH_PATH)?)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await?;
        let body: RefreshResponse = read_json(resp).await?;
        self.tokens.set(super::tokens::ACCESS_KEY, &body.access)?;
        debug!("access token refreshed");
        Ok(body.access)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .finish()
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    Ok(check_status(resp).await?.json().await?)
}

/// Map non-success statuses to errors. 400 bodies of the form
/// `{field: [messages]}` become [`ApiError::Validation`].
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        if let Some(fields) = field_errors(&body) {
            return Err(ApiError::Validation(fields));
        }
    }
    let message = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => json
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string)
            .unwrap_or(body),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body,
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

fn field_errors(body: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let json: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body).ok()?;
    let fields: BTreeMap<String, Vec<String>> = json
        .into_iter()
        .map(|(field, value)| {
            let messages = match value {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .map(|m| match m {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                serde_json::Value::String(s) => vec![s],
                other => vec![other.to_string()],
            };
            (field, messages)
        })
        .collect();
    (!fields.is_empty()).then_some(fields)
}
