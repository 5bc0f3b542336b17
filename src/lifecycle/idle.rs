//! Idle timeout monitor: forced logout after a window of no interaction.
//!
//! DESIGN
//! ======
//! One task owns the single pending deadline as a pinned `Sleep`. Activity
//! events arrive over an unbounded channel; a qualifying event re-arms by
//! resetting that same `Sleep`, so cancelling the old deadline and setting
//! the new one is a single step inside the task and can never race a fire.
//!
//! ```text
//!   Armed(deadline) --activity--> Armed(now + timeout)
//!   Armed(deadline) --deadline--> Fired   (forced-logout sequence)
//!   Fired           --activity--> Armed   (only while still logged in)
//!   any             --teardown--> Disabled
//! ```
//!
//! Teardown detaches every listener before aborting the task, so a listener
//! handed out earlier reports failed delivery from the moment `dispose`
//! returns, not only once the runtime has dropped the aborted task.
//!
//! ERROR HANDLING
//! ==============
//! The forced-logout sequence does not branch on the logout result: the user
//! is navigated away and notified either way. Failures are logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::shell::{LANDING_ROUTE, Shell};
use crate::state::auth::AuthStore;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session expired due to inactivity. Please log in again.";

/// A user interaction reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    PointerMove,
    Focus,
}

impl ActivityEvent {
    /// Only deliberate interactions keep a session alive.
    #[must_use]
    pub fn is_qualifying(self) -> bool {
        matches!(self, Self::PointerDown | Self::KeyDown | Self::Scroll | Self::TouchStart)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Armed { deadline: Instant },
    Fired,
    Disabled,
}

/// Cloneable sender handed to event sources.
#[derive(Clone)]
pub struct ActivityListener {
    tx: mpsc::UnboundedSender<ActivityEvent>,
    detached: Arc<AtomicBool>,
}

impl ActivityListener {
    /// Deliver an event. Returns `false` once the monitor has been torn down.
    pub fn record(&self, event: ActivityEvent) -> bool {
        self.is_attached() && self.tx.send(event).is_ok()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

pub struct IdleMonitor;

impl IdleMonitor {
    /// Arm the monitor and return its mount-scoped handle.
    #[must_use = "dropping the handle disables the monitor"]
    pub fn install(store: Arc<AuthStore>, shell: Arc<dyn Shell>, timeout: Duration) -> IdleMonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let deadline = Instant::now() + timeout;
        let (state, _) = watch::channel(IdleState::Armed { deadline });
        let state = Arc::new(state);
        let task = tokio::spawn(run_monitor(store, shell, timeout, deadline, rx, Arc::clone(&state)));
        let listener = ActivityListener { tx, detached: Arc::new(AtomicBool::new(false)) };
        IdleMonitorHandle { listener, state, task: Some(task) }
    }
}

async fn run_monitor(
    store: Arc<AuthStore>,
    shell: Arc<dyn Shell>,
    timeout: Duration,
    deadline: Instant,
    mut events: mpsc::UnboundedReceiver<ActivityEvent>,
    state: Arc<watch::Sender<IdleState>>,
) {
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);
    let mut armed = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !event.is_qualifying() {
                    continue;
                }
                if !armed && !store.is_logged_in() {
                    continue;
                }
                let deadline = Instant::now() + timeout;
                sleep.as_mut().reset(deadline);
                armed = true;
                state.send_replace(IdleState::Armed { deadline });
            }
            () = &mut sleep, if armed => {
                armed = false;
                state.send_replace(IdleState::Fired);
                if store.is_logged_in() {
                    force_logout(&store, shell.as_ref()).await;
                } else {
                    debug!("idle deadline elapsed without a session");
                }
            }
        }
    }
}

async fn force_logout(store: &AuthStore, shell: &dyn Shell) {
    info!("idle timeout reached; forcing logout");
    shell.set_loading(true);
    if let Err(e) = store.logout().await {
        warn!(error = %e, "forced logout did not complete cleanly");
    }
    shell.navigate_to(LANDING_ROUTE);
    shell.set_loading(false);
    shell.alert(SESSION_EXPIRED_MESSAGE);
}

/// Mount-scoped handle. Dropping it disables the monitor.
pub struct IdleMonitorHandle {
    listener: ActivityListener,
    state: Arc<watch::Sender<IdleState>>,
    task: Option<JoinHandle<()>>,
}

impl IdleMonitorHandle {
    #[must_use]
    pub fn listener(&self) -> ActivityListener {
        self.listener.clone()
    }

    pub fn record(&self, event: ActivityEvent) -> bool {
        self.listener.record(event)
    }

    #[must_use]
    pub fn state(&self) -> IdleState {
        *self.state.borrow()
    }

    /// Cancel the deadline and detach every listener.
    pub fn dispose(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            self.listener.detached.store(true, Ordering::SeqCst);
            task.abort();
            self.state.send_replace(IdleState::Disabled);
        }
    }
}

impl Drop for IdleMonitorHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "idle_test.rs"]
mod tests;
