//! Mock Auth Backend Implementation
//!
//! In-memory users, tables, and session for tests and local development:
//! - `MockBackend`: password sign-in, single-row lookups, session-change notifications
//! - Programmable table failures and a lookup log for assertions
//! - Thread-safe via `Arc<Mutex<>>`

use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::AuthBackend;
use crate::error::BackendError;
use crate::session::{AuthChangeEvent, Session, SessionChange};
use crate::types::BaseIdentity;

/// Capacity of the session-change channel
const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct MockUser {
    id: Uuid,
    password: String,
}

/// In-memory auth backend
#[derive(Debug, Clone)]
pub struct MockBackend {
    users: Arc<Mutex<HashMap<String, MockUser>>>,
    tables: Arc<Mutex<HashMap<String, HashMap<Uuid, Value>>>>,
    failing_tables: Arc<Mutex<HashSet<String>>>,
    auth_unavailable: Arc<Mutex<bool>>,
    session_unavailable: Arc<Mutex<bool>>,
    session: Arc<Mutex<Option<Session>>>,
    lookups: Arc<Mutex<Vec<String>>>,
    changes: broadcast::Sender<SessionChange>,
}

impl MockBackend {
    /// Create an empty mock backend.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            tables: Arc::new(Mutex::new(HashMap::new())),
            failing_tables: Arc::new(Mutex::new(HashSet::new())),
            auth_unavailable: Arc::new(Mutex::new(false)),
            session_unavailable: Arc::new(Mutex::new(false)),
            session: Arc::new(Mutex::new(None)),
            lookups: Arc::new(Mutex::new(Vec::new())),
            changes,
        }
    }

    /// Register a user that can sign in with `password`; returns its id.
    pub fn add_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().expect("users lock poisoned").insert(
            email.to_string(),
            MockUser {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    /// Insert or replace a row keyed by its `id` column.
    ///
    /// # Panics
    ///
    /// Panics if the row has no UUID `id`.
    pub fn insert_row(&self, table: &str, row: Value) {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("mock rows need a UUID `id` column");
        self.tables
            .lock()
            .expect("tables lock poisoned")
            .entry(table.to_string())
            .or_default()
            .insert(id, row);
    }

    /// Remove a row; returns whether it existed.
    pub fn delete_row(&self, table: &str, id: Uuid) -> bool {
        self.tables
            .lock()
            .expect("tables lock poisoned")
            .get_mut(table)
            .and_then(|rows| rows.remove(&id))
            .is_some()
    }

    /// Current contents of a row, if any.
    pub fn row(&self, table: &str, id: Uuid) -> Option<Value> {
        self.tables
            .lock()
            .expect("tables lock poisoned")
            .get(table)
            .and_then(|rows| rows.get(&id).cloned())
    }

    /// Make every lookup against `table` fail with a request error.
    pub fn fail_table(&self, table: &str) {
        self.failing_tables
            .lock()
            .expect("failing tables lock poisoned")
            .insert(table.to_string());
    }

    /// Make sign-in requests fail with a request error.
    pub fn set_auth_unavailable(&self, unavailable: bool) {
        *self
            .auth_unavailable
            .lock()
            .expect("auth flag lock poisoned") = unavailable;
    }

    /// Make session reads fail with a request error.
    pub fn set_session_unavailable(&self, unavailable: bool) {
        *self
            .session_unavailable
            .lock()
            .expect("session flag lock poisoned") = unavailable;
    }

    /// Table names looked up so far, in order.
    pub fn recorded_lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock poisoned").clone()
    }

    /// Clear the lookup log.
    pub fn reset_lookups(&self) {
        self.lookups.lock().expect("lookups lock poisoned").clear();
    }

    /// Rotate the current session's tokens and notify subscribers, the way
    /// the backend's background refresh does. Returns the new session.
    pub fn emit_token_refresh(&self) -> Option<Session> {
        let refreshed = {
            let mut session = self.session.lock().expect("session lock poisoned");
            let current = session.as_ref()?;
            let next = issue_session(current.user.clone());
            *session = Some(next.clone());
            next
        };
        self.notify(AuthChangeEvent::TokenRefreshed, Some(refreshed.clone()));
        Some(refreshed)
    }

    fn notify(&self, event: AuthChangeEvent, session: Option<Session>) {
        tracing::debug!(event = ?event, "Mock backend: session change");
        // No receivers is fine
        let _ = self.changes.send(SessionChange::new(event, session));
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn issue_session(user: BaseIdentity) -> Session {
    Session {
        access_token: format!("mock-access-{}", Uuid::new_v4()),
        refresh_token: format!("mock-refresh-{}", Uuid::new_v4()),
        expires_at: Utc::now() + Duration::hours(1),
        user,
    }
}

#[async_trait::async_trait]
impl AuthBackend for MockBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        if *self
            .session_unavailable
            .lock()
            .map_err(|e| BackendError::Request(format!("session flag lock poisoned: {e}")))?
        {
            return Err(BackendError::Request("mock session store unavailable".to_string()));
        }

        Ok(self
            .session
            .lock()
            .map_err(|e| BackendError::Request(format!("session lock poisoned: {e}")))?
            .clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, BackendError> {
        if *self
            .auth_unavailable
            .lock()
            .map_err(|e| BackendError::Request(format!("auth flag lock poisoned: {e}")))?
        {
            return Err(BackendError::Request("mock auth unavailable".to_string()));
        }

        let user = self
            .users
            .lock()
            .map_err(|e| BackendError::Request(format!("users lock poisoned: {e}")))?
            .get(email)
            .cloned();

        let user = match user {
            Some(user) if user.password == password => user,
            _ => return Ok(None),
        };

        let session = issue_session(BaseIdentity {
            id: user.id,
            email: email.to_string(),
        });
        *self
            .session
            .lock()
            .map_err(|e| BackendError::Request(format!("session lock poisoned: {e}")))? =
            Some(session.clone());

        self.notify(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.session
            .lock()
            .map_err(|e| BackendError::Request(format!("session lock poisoned: {e}")))?
            .take();
        self.notify(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn fetch_row(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Value>, BackendError> {
        self.lookups
            .lock()
            .map_err(|e| BackendError::Request(format!("lookups lock poisoned: {e}")))?
            .push(table.to_string());

        let failing = self
            .failing_tables
            .lock()
            .map_err(|e| BackendError::Request(format!("failing tables lock poisoned: {e}")))?
            .contains(table);
        if failing {
            return Err(BackendError::Request(format!(
                "mock failure for table {}",
                table
            )));
        }

        Ok(self.row(table, id))
    }
}
