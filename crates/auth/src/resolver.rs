//! Session/role resolution
//!
//! Turns a backend session into a [`ResolvedUser`]. Every lookup is
//! independently fault tolerant: failures are logged and degrade the
//! result, they are never retried and never returned to the caller.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::backend::AuthBackend;
use crate::config::ProfileTables;
use crate::error::BackendError;
use crate::session::Session;
use crate::types::{AdminProfile, ResolvedUser, Role, RoleRecord, StudentProfile};

/// Resolve the caller's role and profile for `session`.
///
/// Returns `None` only for an absent session.
pub async fn resolve_user(
    backend: &dyn AuthBackend,
    tables: &ProfileTables,
    session: Option<&Session>,
) -> Option<ResolvedUser> {
    let session = session?;
    let identity = session.user.clone();
    let user_id = identity.id;

    let record = match fetch_typed::<RoleRecord>(backend, &tables.roles, user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::error!(user_id = %user_id, table = %tables.roles, "No role record for user");
            return Some(ResolvedUser::Unknown { identity });
        }
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, table = %tables.roles, "Failed to load role record");
            return Some(ResolvedUser::Unknown { identity });
        }
    };

    let user = match record.role {
        Role::Admin => {
            let profile =
                fetch_profile::<AdminProfile>(backend, &tables.admins, user_id, &record.role).await;
            ResolvedUser::Admin {
                identity,
                record,
                profile,
            }
        }
        Role::Student => {
            let profile =
                fetch_profile::<StudentProfile>(backend, &tables.students, user_id, &record.role)
                    .await;
            ResolvedUser::Student {
                identity,
                record,
                profile,
            }
        }
        Role::Parent | Role::Other(_) => ResolvedUser::Member { identity, record },
    };

    tracing::debug!(
        user_id = %user_id,
        role = ?user.role().map(Role::as_str),
        has_profile = user.has_profile(),
        "User resolved"
    );

    Some(user)
}

async fn fetch_profile<T: DeserializeOwned>(
    backend: &dyn AuthBackend,
    table: &str,
    user_id: Uuid,
    role: &Role,
) -> Option<T> {
    match fetch_typed::<T>(backend, table, user_id).await {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            tracing::warn!(user_id = %user_id, role = %role, table = %table, "Profile row not found, continuing without profile");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user_id, role = %role, table = %table, "Failed to load profile, continuing without profile");
            None
        }
    }
}

async fn fetch_typed<T: DeserializeOwned>(
    backend: &dyn AuthBackend,
    table: &str,
    id: Uuid,
) -> Result<Option<T>, BackendError> {
    match backend.fetch_row(table, id).await? {
        Some(row) => serde_json::from_value(row)
            .map(Some)
            .map_err(|e| BackendError::Decode(format!("{} row: {}", table, e))),
        None => Ok(None),
    }
}
