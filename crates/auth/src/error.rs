//! Backend and authentication errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error from a call to the auth backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Backend request error: {0}")]
    Request(String),

    #[error("Backend response error: {0}")]
    Response(String),

    #[error("Backend decode error: {0}")]
    Decode(String),
}

/// Rejection for role-gated extractors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Initial session resolution has not finished
    SessionLoading,
    NotAuthenticated,
    /// Signed in, but the role lookup failed or found no row
    RoleUnresolved,
    InsufficientRole,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::SessionLoading => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SESSION_LOADING",
                "Session is still loading",
            ),
            AuthError::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHENTICATED",
                "Sign in required",
            ),
            AuthError::RoleUnresolved => (
                StatusCode::UNAUTHORIZED,
                "ROLE_UNRESOLVED",
                "User role could not be resolved",
            ),
            AuthError::InsufficientRole => (
                StatusCode::FORBIDDEN,
                "INSUFFICIENT_ROLE",
                "Your role cannot access this resource",
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
