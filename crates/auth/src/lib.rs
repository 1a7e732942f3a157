//! Role-aware authentication for ITC Kids
//!
//! Resolves a backend session into a [`ResolvedUser`] (identity + role record +
//! role profile), keeps the process-wide current user in an [`AuthProvider`],
//! and provides axum extractors for role-gated routes.

mod backend;
mod claims;
mod config;
mod error;
mod extractors;
mod jwt;
pub mod mock;
mod provider;
mod resolver;
mod session;
mod types;

pub use backend::AuthBackend;
pub use claims::SupabaseClaims;
pub use config::ProfileTables;
pub use error::{AuthError, BackendError};
pub use extractors::{AdminUser, CurrentUser, RoleUser, StudentUser};
pub use jwt::{decode_access_token, extract_bearer_token, session_from_tokens};
pub use mock::MockBackend;
pub use provider::{AuthProvider, AuthState, AuthSubscription};
pub use resolver::resolve_user;
pub use session::{AuthChangeEvent, Session, SessionChange};
pub use types::{AdminProfile, BaseIdentity, ResolvedUser, Role, RoleRecord, StudentProfile};
