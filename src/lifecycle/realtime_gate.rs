//! Realtime connection gate: channel open iff enabled and logged in.
//!
//! DESIGN
//! ======
//! A single task holds a `watch::Receiver<AuthState>`. It reconciles once on
//! mount, again after every state change, and again when the active session
//! reaches `expires_at` (expiry publishes nothing, so the task keeps its own
//! timer for it):
//!
//! - feature flag off: the task is never spawned and the channel is never
//!   touched;
//! - logged in and closed: connect with the cached session;
//! - logged out and open: disconnect.
//!
//! Teardown is a shutdown signal rather than an abort, so the task can run
//! its final disconnect before exiting. Dropping the handle sends the same
//! signal; `shutdown` additionally waits for the task to finish.
//!
//! The gate issues intent only. It neither retries a failed connect nor backs
//! off; the next auth state change is the next attempt.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::net::ws_channel::ChannelError;
use crate::session::Session;
use crate::state::auth::{AuthState, AuthStore};

/// Push channel the gate opens and closes.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Open the channel. Must be a no-op when already open.
    async fn connect(&self, session: &Session) -> Result<(), ChannelError>;

    /// Close the channel. Must be a no-op when already closed.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

pub struct ConnectionGate;

impl ConnectionGate {
    #[must_use = "dropping the handle closes the channel"]
    pub fn install(enabled: bool, store: &AuthStore, channel: Arc<dyn RealtimeChannel>) -> GateHandle {
        if !enabled {
            debug!("realtime channel disabled by feature flag");
            return GateHandle { shutdown: None, task: None };
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_gate(store.subscribe(), channel, shutdown_rx));
        GateHandle { shutdown: Some(shutdown_tx), task: Some(task) }
    }
}

async fn reconcile(state: &AuthState, channel: &dyn RealtimeChannel) {
    match state.active_session_at(OffsetDateTime::now_utc()) {
        Some(session) => {
            if !channel.is_connected() {
                if let Err(e) = channel.connect(session).await {
                    warn!(error = %e, "realtime channel connect failed");
                }
            }
        }
        None => {
            if channel.is_connected() {
                channel.disconnect().await;
            }
        }
    }
}

/// Monotonic deadline at which the active session in `state` expires.
fn session_deadline(state: &AuthState, now: OffsetDateTime) -> Option<Instant> {
    let session = state.active_session_at(now)?;
    let remaining = std::time::Duration::try_from(session.expires_at - now).unwrap_or_default();
    Some(Instant::now() + remaining)
}

async fn sleep_until_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_gate(
    mut auth: watch::Receiver<AuthState>,
    channel: Arc<dyn RealtimeChannel>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let state = auth.borrow_and_update().clone();
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            () = reconcile(&state, channel.as_ref()) => {}
        }
        let expiry = session_deadline(&state, OffsetDateTime::now_utc());
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = sleep_until_expiry(expiry) => {
                debug!("session reached its expiry; reconciling");
            }
        }
    }

    if channel.is_connected() {
        channel.disconnect().await;
    }
    debug!("realtime gate stopped");
}

/// Mount-scoped handle for the gate.
pub struct GateHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl GateHandle {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop reconciling, close the channel if open, and wait for both.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "realtime gate task failed");
            }
        }
    }
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
#[path = "realtime_gate_test.rs"]
mod tests;
