//! UI capabilities the session runtime drives.
//!
//! SYSTEM CONTEXT
//! ==============
//! The lifecycle components never render anything themselves. They ask the
//! host for a loading indicator, a route change, or a blocking alert through
//! this trait, so the same runtime can sit behind a browser shell, a desktop
//! shell, or the terminal agent.

use std::io::Write;

use tracing::info;

/// Route the idle monitor sends the user to after a forced logout.
pub const LANDING_ROUTE: &str = "/";

pub trait Shell: Send + Sync {
    /// Show or hide the global loading indicator.
    fn set_loading(&self, on: bool);

    /// Navigate to `route`.
    fn navigate_to(&self, route: &str);

    /// Show a blocking notification. Returns once the user has seen it.
    fn alert(&self, message: &str);
}

/// Shell for the terminal agent. Navigation is logged; alerts go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalShell;

impl Shell for TerminalShell {
    fn set_loading(&self, on: bool) {
        info!(on, "loading indicator");
    }

    fn navigate_to(&self, route: &str) {
        info!(%route, "navigate");
    }

    fn alert(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\n*** {message} ***\n");
        let _ = stderr.flush();
    }
}
