//! Axum extractors for role-gated routes
//!
//! Generic over any state `S` where `AuthProvider: FromRef<S>`.
//! This is axum's idiomatic nested-state pattern.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::error::AuthError;
use crate::jwt::extract_bearer_token;
use crate::provider::{AuthProvider, AuthState};
use crate::types::{AdminProfile, BaseIdentity, ResolvedUser, StudentProfile};

/// Any signed-in user, including degraded (role-less) identities.
///
/// The request must carry `Authorization: Bearer <access token>` of the
/// current session.
#[derive(Debug)]
pub struct CurrentUser(pub ResolvedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let provider = AuthProvider::from_ref(state);
        let token = extract_bearer_token(&parts.headers);

        match provider.state_for_token(token) {
            AuthState::Unknown => Err(AuthError::SessionLoading),
            AuthState::Anonymous => Err(AuthError::NotAuthenticated),
            AuthState::Authenticated(user) => Ok(CurrentUser(user)),
        }
    }
}

/// Signed-in user whose role resolved; degraded identities are rejected
/// as unauthenticated.
#[derive(Debug)]
pub struct RoleUser(pub ResolvedUser);

impl<S> FromRequestParts<S> for RoleUser
where
    AuthProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role().is_none() {
            return Err(AuthError::RoleUnresolved);
        }

        Ok(RoleUser(user))
    }
}

/// Admin-only extractor.
///
/// The profile is `None` when the admin row is missing.
#[derive(Debug)]
pub struct AdminUser {
    pub identity: BaseIdentity,
    pub profile: Option<AdminProfile>,
}

impl<S> FromRequestParts<S> for AdminUser
where
    AuthProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let RoleUser(user) = RoleUser::from_request_parts(parts, state).await?;

        match user {
            ResolvedUser::Admin {
                identity, profile, ..
            } => Ok(AdminUser { identity, profile }),
            _ => Err(AuthError::InsufficientRole),
        }
    }
}

/// Student-only extractor.
#[derive(Debug)]
pub struct StudentUser {
    pub identity: BaseIdentity,
    pub profile: Option<StudentProfile>,
}

impl<S> FromRequestParts<S> for StudentUser
where
    AuthProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let RoleUser(user) = RoleUser::from_request_parts(parts, state).await?;

        match user {
            ResolvedUser::Student {
                identity, profile, ..
            } => Ok(StudentUser { identity, profile }),
            _ => Err(AuthError::InsufficientRole),
        }
    }
}
