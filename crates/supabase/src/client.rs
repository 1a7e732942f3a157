//! Supabase HTTP Client Implementation
//!
//! Talks to the Supabase auth API at `{url}/auth/v1` (password grant,
//! refresh grant, logout) and to table rows at `{url}/rest/v1/{table}`.
//! The session is mirrored locally for the process lifetime and every
//! change is broadcast to subscribers.

use chrono::{DateTime, Duration, Utc};
use itckids_auth::{
    session_from_tokens, AuthBackend, AuthChangeEvent, BackendError, BaseIdentity, Session,
    SessionChange,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::BackendConfig;

/// Capacity of the session-change channel
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Pause after a failed automatic refresh before trying again
const REFRESH_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Auth API token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in.unwrap_or(3600)));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: BaseIdentity {
                id: self.user.id,
                email: self.user.email.unwrap_or_default(),
            },
        }
    }
}

/// Supabase client for auth and single-row table lookups.
pub struct SupabaseClient {
    http: reqwest::Client,
    auth_url: String,
    rest_url: String,
    anon_key: String,
    jwt_secret: Option<String>,
    refresh_margin: Duration,
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
}

impl SupabaseClient {
    /// Create a new Supabase client from configuration.
    pub fn new(config: BackendConfig) -> Self {
        let base_url = config.url.trim_end_matches('/');
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            auth_url: format!("{}/auth/v1", base_url),
            rest_url: format!("{}/rest/v1", base_url),
            anon_key: config.anon_key,
            jwt_secret: config.jwt_secret,
            refresh_margin: Duration::seconds(config.refresh_margin_secs.max(0)),
            session: RwLock::new(None),
            changes,
        }
    }

    /// Locally mirrored session, if any
    pub fn current_session(&self) -> Option<Session> {
        match self.session.read() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut slot) => *slot = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn notify(&self, event: AuthChangeEvent, session: Option<Session>) {
        tracing::debug!(event = ?event, "Supabase session change");
        // No receivers is fine
        let _ = self.changes.send(SessionChange::new(event, session));
    }

    /// Restore a persisted session from a token pair.
    ///
    /// An expired access token is refreshed immediately; `Ok(None)` means the
    /// refresh token was no longer valid.
    pub async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>, BackendError> {
        let session = session_from_tokens(access_token, refresh_token, self.jwt_secret.as_deref())?;

        if session.is_expired(Duration::zero()) {
            tracing::debug!(user_id = %session.user.id, "Restored session expired, refreshing");
            self.store(Some(session));
            return self.refresh_session().await;
        }

        self.store(Some(session.clone()));
        self.notify(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    /// Exchange the refresh token for a new session.
    ///
    /// `Ok(None)` when there is no session or the refresh token was rejected;
    /// a rejected token clears the session and notifies `SignedOut`.
    pub async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(current) = self.current_session() else {
            return Ok(None);
        };

        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&RefreshGrant {
                refresh_token: &current.refresh_token,
            })
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            tracing::warn!(user_id = %current.user.id, status = %status, "Refresh token rejected, signing out");
            self.store(None);
            self.notify(AuthChangeEvent::SignedOut, None);
            return Ok(None);
        }

        let session = Self::read_token_response(response).await?;
        self.store(Some(session.clone()));
        self.notify(AuthChangeEvent::TokenRefreshed, Some(session.clone()));

        tracing::debug!(user_id = %session.user.id, expires_at = %session.expires_at, "Session refreshed");
        Ok(Some(session))
    }

    /// Refresh the session `refresh_margin` before it expires.
    ///
    /// The task holds only a weak reference and ends when the client is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_auto_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::downgrade(self);
        let mut changes = self.changes.subscribe();

        tokio::spawn(async move {
            loop {
                let delay = match client.upgrade() {
                    Some(client) => client
                        .current_session()
                        .map(|session| session.refresh_in(client.refresh_margin)),
                    None => break,
                };

                match delay {
                    Some(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {
                                let Some(client) = client.upgrade() else { break };
                                if let Err(e) = client.refresh_session().await {
                                    tracing::warn!(error = %e, "Automatic token refresh failed");
                                    tokio::time::sleep(REFRESH_RETRY_DELAY).await;
                                }
                            }
                            change = changes.recv() => {
                                if let Err(RecvError::Closed) = change {
                                    break;
                                }
                            }
                        }
                    }
                    None => {
                        if let Err(RecvError::Closed) = changes.recv().await {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Automatic token refresh stopped");
        })
    }

    async fn read_token_response(response: reqwest::Response) -> Result<Session, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(BackendError::Response(format!(
                "Supabase auth returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("Failed to parse token response: {}", e)))?;

        Ok(token.into_session())
    }

    fn bearer(&self) -> String {
        let token = self
            .current_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        format!("Bearer {}", token)
    }
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.current_session())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, BackendError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "Password sign-in rejected");
            return Ok(None);
        }

        let session = Self::read_token_response(response).await?;
        self.store(Some(session.clone()));
        self.notify(AuthChangeEvent::SignedIn, Some(session.clone()));

        tracing::debug!(user_id = %session.user.id, "Password sign-in succeeded");
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let previous = self.current_session();
        self.store(None);
        self.notify(AuthChangeEvent::SignedOut, None);

        let Some(previous) = previous else {
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&previous.access_token)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        // Already-invalid tokens are as good as signed out
        if status.is_success() || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        Err(BackendError::Response(format!(
            "Supabase logout returned {}: {}",
            status, body
        )))
    }

    async fn fetch_row(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<serde_json::Value>, BackendError> {
        let response = self
            .http
            .get(format!("{}/{}", self.rest_url, table))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(BackendError::Response(format!(
                "Supabase table {} returned {}: {}",
                table, status, body
            )));
        }

        let mut rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("Failed to parse {} rows: {}", table, e)))?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(BackendError::Response(format!(
                "Expected a single {} row for {}, found {}",
                table, id, n
            ))),
        }
    }
}
