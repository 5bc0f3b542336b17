//! gigboard: client session runtime for the gigboard marketplace.
//!
//! SYSTEM CONTEXT
//! ==============
//! The marketplace front-end is mostly presentation. This crate holds the
//! part with real lifecycle rules: the persisted auth store, the one-shot
//! bootstrap check, the idle-timeout forced logout, and the login-gated
//! realtime channel. Hosts (browser shell, terminal agent) plug in through
//! the `Shell`, `AuthApi`, `SessionStorage`, and `RealtimeChannel` traits.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod session;
pub mod shell;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
