//! Networking: REST auth client and the WebSocket realtime channel.

pub mod api;
pub mod ws_channel;
