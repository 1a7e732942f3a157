//! ITC Kids Supabase Backend
//!
//! Provides the auth backend the session/role resolver runs against:
//! - Supabase auth (GoTrue) + table (PostgREST) HTTP client for production
//! - In-memory mock backend for testing and local development
//! - Configurable provider, project URL, anon key, and refresh margin

pub mod client;

use itckids_auth::{AuthBackend, BackendError, MockBackend};
use std::sync::Arc;

pub use client::SupabaseClient;

/// Default seconds before expiry at which sessions are refreshed
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

/// Auth backend configuration.
#[derive(Clone)]
pub struct BackendConfig {
    /// Backend provider (supabase, mock)
    pub provider: String,
    /// Supabase project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public anon key sent as `apikey` on every request
    pub anon_key: String,
    /// Optional JWT secret for verifying restored access tokens
    pub jwt_secret: Option<String>,
    /// Refresh the session this many seconds before it expires
    pub refresh_margin_secs: i64,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .finish()
    }
}

impl BackendConfig {
    /// Create backend config from environment variables.
    pub fn from_env() -> Result<Self, BackendError> {
        dotenvy::dotenv().ok();

        let provider =
            std::env::var("BACKEND_PROVIDER").unwrap_or_else(|_| "supabase".to_string());
        let url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let anon_key = std::env::var("SUPABASE_ANON_KEY").unwrap_or_default();
        let jwt_secret = std::env::var("SUPABASE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let refresh_margin_secs = std::env::var("REFRESH_MARGIN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_MARGIN_SECS);

        let config = Self {
            provider,
            url,
            anon_key,
            jwt_secret,
            refresh_margin_secs,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BackendError> {
        if self.provider == "supabase" {
            if self.url.is_empty() {
                return Err(BackendError::Configuration(
                    "SUPABASE_URL is required for Supabase provider".to_string(),
                ));
            }
            if self.anon_key.is_empty() {
                return Err(BackendError::Configuration(
                    "SUPABASE_ANON_KEY is required for Supabase provider".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Factory for creating AuthBackend implementations.
pub struct BackendFactory;

impl BackendFactory {
    /// Create an AuthBackend based on configuration.
    ///
    /// The Supabase client starts its background token refresh, so this must
    /// run inside a tokio runtime.
    pub fn create(config: BackendConfig) -> Result<Arc<dyn AuthBackend>, BackendError> {
        match config.provider.as_str() {
            "supabase" => {
                tracing::info!(url = %config.url, "Creating Supabase auth backend");
                config.validate()?;
                let client = Arc::new(SupabaseClient::new(config));
                client.spawn_auto_refresh();
                Ok(client)
            }
            "mock" => {
                tracing::info!("Creating mock auth backend");
                Ok(Arc::new(MockBackend::new()))
            }
            provider => Err(BackendError::Configuration(format!(
                "Unknown backend provider: {}. Supported providers: supabase, mock",
                provider
            ))),
        }
    }
}
