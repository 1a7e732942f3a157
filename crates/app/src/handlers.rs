//! Auth and profile handlers
//!
//! - GET  /auth/session : Current auth state and merged user
//! - POST /auth/login   : Password sign-in, returns the access token
//! - POST /auth/logout  : Sign out
//! - POST /auth/refresh : Re-resolve role and profile for the current session
//! - GET  /admin/me     : Admin identity and profile
//! - GET  /student/me   : Student identity and profile
//!
//! Everything except login requires `Authorization: Bearer <access token>`
//! of the current session to see or act on the signed-in user.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use itckids_auth::{
    extract_bearer_token, AdminProfile, AdminUser, AuthState, BaseIdentity, CurrentUser,
    ResolvedUser, StudentProfile, StudentUser,
};
use itckids_common::{Error, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;

// ============================================================
// DTOs
// ============================================================

/// Snapshot of the auth provider
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub is_loading: bool,
    pub is_authenticated: bool,
    /// Merged identity, role record, and profile; `null` when signed out
    pub user: Option<ResolvedUser>,
}

impl SessionResponse {
    fn from_state(state: AuthState) -> Self {
        Self {
            is_loading: state.is_loading(),
            is_authenticated: state.is_authenticated(),
            user: state.user().cloned(),
        }
    }
}

/// Password sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Option<ResolvedUser>,
}

#[derive(Debug, Serialize)]
pub struct AdminMeResponse {
    #[serde(flatten)]
    pub identity: BaseIdentity,
    pub profile: Option<AdminProfile>,
}

#[derive(Debug, Serialize)]
pub struct StudentMeResponse {
    #[serde(flatten)]
    pub identity: BaseIdentity,
    pub profile: Option<StudentProfile>,
}

// ============================================================
// Handlers
// ============================================================

pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let token = extract_bearer_token(&headers);
    Json(SessionResponse::from_state(state.auth.state_for_token(token)))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if !state.auth.login(&request.email, &request.password).await {
        return Err(Error::InvalidCredentials);
    }

    // Signed out again between sign-in and here
    let session = state.auth.session().ok_or(Error::InvalidCredentials)?;

    Ok(Json(LoginResponse {
        access_token: session.access_token,
        expires_at: session.expires_at,
        user: state.auth.current_user(),
    }))
}

pub async fn logout(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> StatusCode {
    tracing::info!(user_id = %user.id(), "Logout requested");
    state.auth.logout().await;
    StatusCode::NO_CONTENT
}

pub async fn refresh(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    headers: HeaderMap,
) -> Json<SessionResponse> {
    state.auth.refresh_user().await;
    let token = extract_bearer_token(&headers);
    Json(SessionResponse::from_state(state.auth.state_for_token(token)))
}

pub async fn admin_me(admin: AdminUser) -> Json<AdminMeResponse> {
    Json(AdminMeResponse {
        identity: admin.identity,
        profile: admin.profile,
    })
}

pub async fn student_me(student: StudentUser) -> Json<StudentMeResponse> {
    Json(StudentMeResponse {
        identity: student.identity,
        profile: student.profile,
    })
}
