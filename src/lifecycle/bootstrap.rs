//! Bootstrap guard: one deferred session check per process.
//!
//! DESIGN
//! ======
//! Mounting schedules `AuthStore::check_session` after a short delay so the
//! first paint uses rehydrated state and never waits on the network. The
//! guard owns two flags:
//!
//! - `scheduled`: a check task is pending. A second mount while pending is a
//!   no-op.
//! - `checked`: the check has started. It is set once, before the round
//!   trip, and never cleared. Later mounts are no-ops and nothing retries.
//!
//! Dropping the handle before the delay elapses cancels the pending task and
//! releases `scheduled`, so a remount can still perform the one check.
//!
//! ERROR HANDLING
//! ==============
//! Check failures are logged and swallowed. The store records them as
//! `Unverified`, which keeps the cached session instead of logging out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::auth::AuthStore;

/// What the single bootstrap check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Verified,
    LoggedOut,
    Unverified,
}

struct GuardInner {
    store: Arc<AuthStore>,
    delay: Duration,
    scheduled: AtomicBool,
    checked: AtomicBool,
    outcome: watch::Sender<Option<BootstrapOutcome>>,
}

#[derive(Clone)]
pub struct BootstrapGuard {
    inner: Arc<GuardInner>,
}

impl BootstrapGuard {
    #[must_use]
    pub fn new(store: Arc<AuthStore>, delay: Duration) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(GuardInner {
                store,
                delay,
                scheduled: AtomicBool::new(false),
                checked: AtomicBool::new(false),
                outcome,
            }),
        }
    }

    /// Schedule the check unless one is pending or already ran.
    #[must_use = "dropping the handle cancels a pending check"]
    pub fn mount(&self) -> BootstrapHandle {
        let inner = Arc::clone(&self.inner);
        if inner.checked.load(Ordering::SeqCst) || inner.scheduled.swap(true, Ordering::SeqCst) {
            debug!("bootstrap check already scheduled or done");
            return BootstrapHandle { inner, task: None };
        }

        let task_inner = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(task_inner.delay).await;
            run_check(&task_inner).await;
        });
        BootstrapHandle { inner, task: Some(task) }
    }

    /// True once the check has started. Never resets.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.inner.checked.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn outcome(&self) -> Option<BootstrapOutcome> {
        *self.inner.outcome.borrow()
    }
}

async fn run_check(inner: &GuardInner) {
    if inner.checked.swap(true, Ordering::SeqCst) {
        return;
    }

    let outcome = match inner.store.check_session().await {
        Ok(true) => BootstrapOutcome::Verified,
        Ok(false) => BootstrapOutcome::LoggedOut,
        Err(e) => {
            warn!(error = %e, "bootstrap session check failed; keeping cached session");
            BootstrapOutcome::Unverified
        }
    };
    debug!(?outcome, "bootstrap session check finished");
    inner.outcome.send_replace(Some(outcome));
}

/// Mount-scoped handle. Dropping it cancels a check that has not started.
pub struct BootstrapHandle {
    inner: Arc<GuardInner>,
    task: Option<JoinHandle<()>>,
}

impl BootstrapHandle {
    /// Whether this mount scheduled the check (as opposed to being a no-op).
    #[must_use]
    pub fn is_scheduler(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for BootstrapHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.inner.scheduled.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
