//! Auth provider: the process-wide "current user" slot
//!
//! Lifecycle: [`AuthProvider::init`] subscribes to backend session changes
//! and runs the first resolution; every change re-reads the backend session
//! and replaces the slot wholesale; sign-out leaves it `Anonymous`; dropping
//! the returned [`AuthSubscription`] stops listening.

use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tokio::task::JoinHandle;

use crate::backend::AuthBackend;
use crate::config::ProfileTables;
use crate::resolver::resolve_user;
use crate::session::Session;
use crate::types::ResolvedUser;

/// Session lifecycle state
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Initial resolution in flight
    Unknown,
    /// No session
    Anonymous,
    Authenticated(ResolvedUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&ResolvedUser> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unknown | AuthState::Anonymous => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Unknown)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    fn label(&self) -> &'static str {
        match self {
            AuthState::Unknown => "unknown",
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticated(_) => "authenticated",
        }
    }
}

struct ProviderInner {
    backend: Arc<dyn AuthBackend>,
    tables: ProfileTables,
    state: watch::Sender<AuthState>,
    /// Session the current state was resolved from
    session: RwLock<Option<Session>>,
    /// Serializes read-session/resolve/replace so a stale resolution
    /// is never written after a newer one
    sync_lock: Mutex<()>,
}

/// Shared handle to the auth state; clones refer to the same slot.
#[derive(Clone)]
pub struct AuthProvider {
    inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("tables", &self.inner.tables)
            .field("state", &self.inner.state.borrow().label())
            .finish()
    }
}

impl AuthProvider {
    pub fn new(backend: Arc<dyn AuthBackend>, tables: ProfileTables) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self {
            inner: Arc::new(ProviderInner {
                backend,
                tables,
                state,
                session: RwLock::new(None),
                sync_lock: Mutex::new(()),
            }),
        }
    }

    /// Subscribe to backend session changes and run the initial resolution.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn init(&self) -> AuthSubscription {
        let mut changes = self.inner.backend.subscribe();
        self.sync().await;

        let provider = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        tracing::debug!(event = ?change.event, "Session change received");
                        provider.sync().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session change stream lagged, resyncing");
                        provider.sync().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Session change stream closed");
                        break;
                    }
                }
            }
        });

        AuthSubscription { handle }
    }

    /// Password sign-in. `false` on rejected credentials or backend failure,
    /// or when the new session could not be read back.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        match self
            .inner
            .backend
            .sign_in_with_password(email, password)
            .await
        {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user.id, "Signed in");
                self.sync().await;
                self.is_authenticated()
            }
            Ok(None) => {
                tracing::info!("Sign-in rejected: invalid credentials");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Sign-in request failed");
                false
            }
        }
    }

    /// Sign out and clear the current user.
    pub async fn logout(&self) {
        if let Err(e) = self.inner.backend.sign_out().await {
            tracing::warn!(error = %e, "Remote sign-out failed, local session cleared");
        }
        self.sync().await;
    }

    /// Re-run resolution for the current session, e.g. after a profile row
    /// was created.
    pub async fn refresh_user(&self) -> Option<ResolvedUser> {
        self.sync().await;
        self.current_user()
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<ResolvedUser> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// True only until the first resolution completes
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// Session behind the current user, if any
    pub fn session(&self) -> Option<Session> {
        match self.inner.session.read() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// State as seen by a caller presenting `access_token`.
    ///
    /// Only the holder of the current session's access token sees the
    /// signed-in user; everyone else is `Anonymous`. Loading is reported
    /// to every caller.
    pub fn state_for_token(&self, access_token: Option<&str>) -> AuthState {
        let state = self.state();
        let Some(user_id) = state.user().map(ResolvedUser::id) else {
            return state;
        };

        let presented = match access_token {
            Some(token) if !token.is_empty() => token,
            _ => return AuthState::Anonymous,
        };

        match self.session() {
            Some(session)
                if session.user.id == user_id && session.access_token == presented =>
            {
                state
            }
            _ => AuthState::Anonymous,
        }
    }

    /// Receiver notified on every replacement of the slot
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Wait for the initial resolution to finish.
    pub async fn wait_until_loaded(&self) -> AuthState {
        let mut rx = self.watch();
        let state = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    async fn sync(&self) {
        let _guard = self.inner.sync_lock.lock().await;

        let session = match self.inner.backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read session, treating as signed out");
                None
            }
        };

        let next = match resolve_user(
            self.inner.backend.as_ref(),
            &self.inner.tables,
            session.as_ref(),
        )
        .await
        {
            Some(user) => AuthState::Authenticated(user),
            None => AuthState::Anonymous,
        };

        match self.inner.session.write() {
            Ok(mut slot) => *slot = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
        let previous = self.inner.state.send_replace(next);
        let current = self.inner.state.borrow();
        if previous.label() != current.label() {
            tracing::info!(from = previous.label(), to = current.label(), "Auth state changed");
        }
    }
}

/// Listener for backend session changes; stops when dropped.
#[derive(Debug)]
pub struct AuthSubscription {
    handle: JoinHandle<()>,
}

impl AuthSubscription {
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop listening for session changes.
    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
