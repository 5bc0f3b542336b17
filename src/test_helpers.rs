//! Shared fakes for unit tests.
//!
//! Every fake appends to a common `Journal` so tests can assert the relative
//! order of calls across collaborators (shell, API, channel).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::lifecycle::realtime_gate::RealtimeChannel;
use crate::net::api::{ApiError, AuthApi};
use crate::net::ws_channel::ChannelError;
use crate::session::{Session, SubjectKind};
use crate::shell::Shell;
use crate::state::auth::AuthStore;
use crate::storage::{MemoryStorage, PersistedAuth, SessionStorage};

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("journal mutex should lock").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal mutex should lock").clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().expect("journal mutex should lock").clear();
    }
}

pub fn session_expiring_in(ttl: Duration) -> Session {
    Session {
        subject_id: Uuid::new_v4(),
        kind: SubjectKind::Individual,
        token: "tok-test".to_owned(),
        expires_at: OffsetDateTime::now_utc() + ttl,
    }
}

pub fn valid_session() -> Session {
    session_expiring_in(Duration::days(1))
}

// =============================================================================
// AUTH API
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    Valid,
    Invalid,
    Fail,
}

pub struct MockAuthApi {
    journal: Journal,
    verify_mode: Mutex<VerifyMode>,
    verify_delay: Mutex<Option<std::time::Duration>>,
    logout_fails: AtomicBool,
    pub verify_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl MockAuthApi {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            verify_mode: Mutex::new(VerifyMode::Valid),
            verify_delay: Mutex::new(None),
            logout_fails: AtomicBool::new(false),
            verify_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_verify_mode(&self, mode: VerifyMode) {
        *self.verify_mode.lock().expect("mock mutex should lock") = mode;
    }

    /// Hold every verify response for `delay` before answering.
    pub fn set_verify_delay(&self, delay: std::time::Duration) {
        *self.verify_delay.lock().expect("mock mutex should lock") = Some(delay);
    }

    pub fn set_logout_fails(&self, fails: bool) {
        self.logout_fails.store(fails, Ordering::SeqCst);
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn verify_session(&self, _session: &Session) -> Result<bool, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push("api:verify");
        let delay = *self.verify_delay.lock().expect("mock mutex should lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match *self.verify_mode.lock().expect("mock mutex should lock") {
            VerifyMode::Valid => Ok(true),
            VerifyMode::Invalid => Ok(false),
            VerifyMode::Fail => Err(ApiError::Request("connection reset".into())),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        self.journal.push("api:login");
        if password == "pw" {
            let mut session = valid_session();
            session.token = format!("tok-{email}");
            Ok(session)
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    async fn logout(&self, _session: &Session) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push("api:logout");
        if self.logout_fails.load(Ordering::SeqCst) {
            Err(ApiError::Status { status: 503, body: String::new() })
        } else {
            Ok(())
        }
    }

    async fn create_ws_ticket(&self, _session: &Session) -> Result<String, ApiError> {
        self.journal.push("api:ticket");
        Ok("ticket-test".to_owned())
    }
}

// =============================================================================
// SHELL
// =============================================================================

pub struct RecordingShell {
    journal: Journal,
}

impl RecordingShell {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Shell for RecordingShell {
    fn set_loading(&self, on: bool) {
        self.journal.push(if on { "loading:on" } else { "loading:off" });
    }

    fn navigate_to(&self, route: &str) {
        self.journal.push(format!("navigate:{route}"));
    }

    fn alert(&self, message: &str) {
        self.journal.push(format!("alert:{message}"));
    }
}

// =============================================================================
// REALTIME CHANNEL
// =============================================================================

pub struct MockChannel {
    journal: Journal,
    connected: AtomicBool,
    fail_connect: AtomicBool,
}

impl MockChannel {
    pub fn new(journal: Journal) -> Self {
        Self { journal, connected: AtomicBool::new(false), fail_connect: AtomicBool::new(false) }
    }

    pub fn already_connected(journal: Journal) -> Self {
        let channel = Self::new(journal);
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    pub fn set_fail_connect(&self, fails: bool) {
        self.fail_connect.store(fails, Ordering::SeqCst);
    }
}

#[async_trait]
impl RealtimeChannel for MockChannel {
    async fn connect(&self, _session: &Session) -> Result<(), ChannelError> {
        self.journal.push("channel:connect");
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.journal.push("channel:disconnect");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// =============================================================================
// STORE FIXTURES
// =============================================================================

pub struct Fixture {
    pub journal: Journal,
    pub api: Arc<MockAuthApi>,
    pub storage: Arc<MemoryStorage>,
    pub store: Arc<AuthStore>,
}

/// Store backed by memory storage and a mock API, logged out.
pub fn fixture() -> Fixture {
    let journal = Journal::default();
    let api = Arc::new(MockAuthApi::new(journal.clone()));
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(AuthStore::new(storage.clone(), api.clone()));
    Fixture { journal, api, storage, store }
}

/// Store rehydrated from a persisted, unexpired session.
pub fn logged_in_fixture() -> Fixture {
    let fx = fixture();
    fx.storage
        .save(&PersistedAuth::logged_in(valid_session()))
        .expect("memory storage should save");
    fx.store.rehydrate().expect("rehydrate should succeed");
    assert!(fx.store.is_logged_in());
    fx
}
