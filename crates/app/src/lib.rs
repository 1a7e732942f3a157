//! ITC Kids application composition root
//!
//! Exposes the auth provider (current user, login, logout) and the
//! role-gated profile routes over HTTP.

pub mod handlers;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use itckids_auth::AuthProvider;

/// Shared state for all routes
#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: AuthProvider,
}

impl FromRef<AppState> for AuthProvider {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Create the main application router with all routes
pub fn create_app(auth: AuthProvider) -> Router {
    let state = AppState { auth };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(|| async { "ITC Kids Career Design v0.0.1-SNAPSHOT" }))
        .route("/auth/session", get(handlers::session))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/admin/me", get(handlers::admin_me))
        .route("/student/me", get(handlers::student_me))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
