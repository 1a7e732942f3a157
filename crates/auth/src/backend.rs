//! Auth backend abstraction
//!
//! The hosted backend (Supabase) owns authentication, consistency, and
//! storage. This trait is the slice of its client SDK the resolver and
//! provider depend on; `itckids-supabase` implements it over HTTP and
//! [`crate::mock::MockBackend`] implements it in memory.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::BackendError;
use crate::session::{Session, SessionChange};

/// Backend client operations consumed by the auth layer.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    /// Point-in-time read of the locally mirrored session.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Subscribe to session changes (sign-in, sign-out, token refresh).
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    /// Password sign-in. `Ok(None)` means the credentials were rejected.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, BackendError>;

    /// Sign out. The local session is cleared even when this returns an error.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Single-row lookup by `id` (`select * ... eq(id) single()`).
    ///
    /// Zero rows is `Ok(None)`; more than one row is an error.
    async fn fetch_row(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<serde_json::Value>, BackendError>;
}
