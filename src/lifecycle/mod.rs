//! Session lifecycle: bootstrap guard, idle monitor, and realtime gate.
//!
//! DESIGN
//! ======
//! The three components share one `AuthStore` and otherwise know nothing
//! about each other. `SessionRuntime` mounts them together and owns their
//! handles, so tearing the runtime down releases every timer, listener, and
//! channel in one place.

pub mod bootstrap;
pub mod idle;
pub mod realtime_gate;

use std::sync::Arc;

use tracing::info;

use crate::config::LifecycleSettings;
use crate::shell::Shell;
use crate::state::auth::AuthStore;

use self::bootstrap::{BootstrapGuard, BootstrapHandle};
use self::idle::{ActivityListener, IdleMonitor, IdleMonitorHandle};
use self::realtime_gate::{ConnectionGate, GateHandle, RealtimeChannel};

/// Everything mounted for one application session.
pub struct SessionRuntime {
    guard: BootstrapGuard,
    bootstrap: BootstrapHandle,
    idle: IdleMonitorHandle,
    gate: GateHandle,
}

impl SessionRuntime {
    /// Mount all lifecycle components against `store`.
    #[must_use = "dropping the runtime tears it down"]
    pub fn mount(
        settings: LifecycleSettings,
        store: Arc<AuthStore>,
        shell: Arc<dyn Shell>,
        channel: Arc<dyn RealtimeChannel>,
    ) -> Self {
        let guard = BootstrapGuard::new(Arc::clone(&store), settings.bootstrap_delay);
        let bootstrap = guard.mount();
        let idle = IdleMonitor::install(Arc::clone(&store), shell, settings.idle_timeout);
        let gate = ConnectionGate::install(settings.realtime_enabled, &store, channel);
        info!(
            idle_timeout_secs = settings.idle_timeout.as_secs(),
            realtime = settings.realtime_enabled,
            "session runtime mounted"
        );
        Self { guard, bootstrap, idle, gate }
    }

    /// Listener to feed user activity into the idle monitor.
    #[must_use]
    pub fn activity(&self) -> ActivityListener {
        self.idle.listener()
    }

    #[must_use]
    pub fn bootstrap(&self) -> &BootstrapGuard {
        &self.guard
    }

    /// Release every timer and listener and close the realtime channel.
    pub async fn teardown(self) {
        let Self { guard: _, bootstrap, idle, gate } = self;
        drop(bootstrap);
        idle.dispose();
        gate.shutdown().await;
        info!("session runtime torn down");
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
