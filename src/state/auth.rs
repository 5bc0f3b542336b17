//! Persisted auth store: the single source of truth for "is the user logged in."
//!
//! DESIGN
//! ======
//! `AuthStore` owns the in-memory `AuthState` and its durable projection.
//! It is injected (usually as `Arc<AuthStore>`) into every component that
//! needs login state. Readers either poll `is_logged_in` or hold a
//! `watch::Receiver` from `subscribe`, which is notified only when the state
//! actually changes.
//!
//! Only the store's own operations write the state: `rehydrate`, `login`,
//! `sign_in`, `check_session`, and `logout`.
//!
//! TRADE-OFFS
//! ==========
//! A failed server check leaves the cached session in place and marks it
//! `Unverified` instead of logging out. A flaky network therefore never kicks
//! a user out, at the cost of trusting a cached session until the next check.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::net::api::{ApiError, AuthApi};
use crate::session::Session;
use crate::storage::{PersistedAuth, SessionStorage, StorageError};

// =============================================================================
// STATE
// =============================================================================

/// How much the client currently trusts its cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// No usable session.
    #[default]
    LoggedOut,
    /// Rehydrated from storage, not yet checked with the server.
    Cached,
    /// The server confirmed the session.
    Verified,
    /// The server could not be asked; the cached session is kept.
    Unverified,
}

/// Client-side projection of the most recent session known to be valid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    pub status: AuthStatus,
    pub session: Option<Session>,
    pub verified_at: Option<OffsetDateTime>,
}

impl AuthState {
    fn logged_out() -> Self {
        Self::default()
    }

    /// Logged in means a non-logged-out status with an unexpired session.
    #[must_use]
    pub fn is_logged_in_at(&self, now: OffsetDateTime) -> bool {
        self.status != AuthStatus::LoggedOut && self.session.as_ref().is_some_and(|s| s.is_valid_at(now))
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in_at(OffsetDateTime::now_utc())
    }

    /// The cached session, if it is still usable at `now`.
    #[must_use]
    pub fn active_session_at(&self, now: OffsetDateTime) -> Option<&Session> {
        if self.is_logged_in_at(now) { self.session.as_ref() } else { None }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

// =============================================================================
// STORE
// =============================================================================

pub struct AuthStore {
    storage: Arc<dyn SessionStorage>,
    api: Arc<dyn AuthApi>,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// Create a logged-out store. Call [`AuthStore::rehydrate`] once at start.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, api: Arc<dyn AuthApi>) -> Self {
        let (state, _) = watch::channel(AuthState::logged_out());
        Self { storage, api, state }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn publish(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
    }

    /// Load the persisted record into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read. The store stays logged out.
    pub fn rehydrate(&self) -> Result<AuthStatus, StorageError> {
        self.rehydrate_at(OffsetDateTime::now_utc())
    }

    /// [`AuthStore::rehydrate`] against an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read. The store stays logged out.
    pub fn rehydrate_at(&self, now: OffsetDateTime) -> Result<AuthStatus, StorageError> {
        let record = match self.storage.load() {
            Ok(record) => record,
            Err(StorageError::Corrupt(e)) => {
                warn!(error = %e, "discarding corrupt persisted session");
                self.clear_storage();
                None
            }
            Err(e) => {
                self.publish(AuthState::logged_out());
                return Err(e);
            }
        };

        let next = match record {
            Some(PersistedAuth { is_logged_in: true, session: Some(session) }) => {
                if session.is_valid_at(now) {
                    debug!(subject = %session.subject_id, kind = %session.kind, "rehydrated session");
                    AuthState { status: AuthStatus::Cached, session: Some(session), verified_at: None }
                } else {
                    info!(subject = %session.subject_id, "persisted session expired; clearing");
                    self.clear_storage();
                    AuthState::logged_out()
                }
            }
            Some(_) => {
                self.clear_storage();
                AuthState::logged_out()
            }
            None => AuthState::logged_out(),
        };

        let status = next.status;
        self.publish(next);
        Ok(status)
    }

    /// Adopt a freshly issued session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted. The in-memory
    /// state is still updated so the current process stays logged in.
    pub fn login(&self, session: Session) -> Result<(), StorageError> {
        let persisted = self.storage.save(&PersistedAuth::logged_in(session.clone()));
        info!(subject = %session.subject_id, kind = %session.kind, "logged in");
        self.publish(AuthState {
            status: AuthStatus::Verified,
            session: Some(session),
            verified_at: Some(OffsetDateTime::now_utc()),
        });
        persisted
    }

    /// Trade credentials for a session and adopt it.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the credentials or the session
    /// cannot be persisted.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), StoreError> {
        let session = self.api.login(email, password).await?;
        self.login(session)?;
        Ok(())
    }

    /// Reconcile the cached session with the server.
    ///
    /// Returns `Ok(true)` when the server honored the session and `Ok(false)`
    /// when there is no usable session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be asked; the state becomes
    /// [`AuthStatus::Unverified`] and the cached session is kept.
    pub async fn check_session(&self) -> Result<bool, StoreError> {
        let cached = self.state.borrow().session.clone();
        let Some(session) = cached else {
            self.publish(AuthState::logged_out());
            return Ok(false);
        };

        if session.is_expired() {
            info!(subject = %session.subject_id, "session expired; logging out locally");
            self.clear_storage();
            self.publish(AuthState::logged_out());
            return Ok(false);
        }

        // The state may have moved on (logout, a newer login) while the
        // request was in flight; a verdict only applies to the session it was
        // asked about.
        match self.api.verify_session(&session).await {
            Ok(true) => {
                let verified_at = OffsetDateTime::now_utc();
                let mut current_session = false;
                self.state.send_if_modified(|current| {
                    if current.session.as_ref() != Some(&session) {
                        return false;
                    }
                    current_session = true;
                    current.status = AuthStatus::Verified;
                    current.verified_at = Some(verified_at);
                    true
                });
                if !current_session {
                    debug!(subject = %session.subject_id, "session changed during check; ignoring verdict");
                    return Ok(self.is_logged_in());
                }
                Ok(true)
            }
            Ok(false) => {
                let mut current_session = false;
                self.state.send_if_modified(|current| {
                    if current.session.as_ref() != Some(&session) {
                        return false;
                    }
                    current_session = true;
                    *current = AuthState::logged_out();
                    true
                });
                if !current_session {
                    debug!(subject = %session.subject_id, "session changed during check; ignoring verdict");
                    return Ok(self.is_logged_in());
                }
                info!(subject = %session.subject_id, "server rejected session");
                self.clear_storage();
                Ok(false)
            }
            Err(e) => {
                self.state.send_if_modified(|current| {
                    if current.session.as_ref() == Some(&session) && current.status != AuthStatus::Unverified {
                        current.status = AuthStatus::Unverified;
                        true
                    } else {
                        false
                    }
                });
                Err(e.into())
            }
        }
    }

    /// Invalidate the session locally, then revoke it on the server.
    ///
    /// Local state and storage are always cleared, even when the server call
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the server error, if any.
    pub async fn logout(&self) -> Result<(), StoreError> {
        let session = self.state.borrow().session.clone();
        self.clear_storage();
        self.publish(AuthState::logged_out());

        let Some(session) = session else {
            return Ok(());
        };
        info!(subject = %session.subject_id, "logged out");
        self.api.logout(&session).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
