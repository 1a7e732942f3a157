//! Access-token decoding for restoring persisted sessions

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use uuid::Uuid;

use crate::claims::SupabaseClaims;
use crate::error::BackendError;
use crate::session::Session;
use crate::types::BaseIdentity;

/// Decode Supabase access-token claims.
///
/// With a JWT secret the HS256 signature is verified; without one the claims
/// are read as-is. Expiry is not enforced here: callers decide whether to
/// refresh an expired token.
pub fn decode_access_token(
    token: &str,
    jwt_secret: Option<&str>,
) -> Result<SupabaseClaims, BackendError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    validation.validate_exp = false;

    let decoding_key = match jwt_secret {
        Some(secret) => DecodingKey::from_secret(secret.as_bytes()),
        None => {
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        }
    };

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Access token decoding failed");
        BackendError::Decode(format!("Invalid access token: {}", e))
    })?;

    Ok(token_data.claims)
}

/// Build a session from a raw token pair
pub fn session_from_tokens(
    access_token: &str,
    refresh_token: &str,
    jwt_secret: Option<&str>,
) -> Result<Session, BackendError> {
    let claims = decode_access_token(access_token, jwt_secret)?;

    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| BackendError::Decode(format!("Invalid user ID in token: {}", claims.sub)))?;
    let email = claims
        .email
        .ok_or_else(|| BackendError::Decode("Access token has no email claim".to_string()))?;
    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0)
        .ok_or_else(|| BackendError::Decode(format!("Invalid exp claim: {}", claims.exp)))?;

    Ok(Session {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at,
        user: BaseIdentity { id, email },
    })
}

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
