//! JWT claims types

use serde::{Deserialize, Serialize};

/// JWT claims from Supabase access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: Option<String>,
    /// Issued at
    #[serde(default)]
    pub iat: u64,
    /// Expires at
    pub exp: u64,
    /// Audience
    #[serde(default)]
    pub aud: String,
    /// Postgres role the token maps to (`authenticated` for signed-in users)
    #[serde(default)]
    pub role: String,
}
