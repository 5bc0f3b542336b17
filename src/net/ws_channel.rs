//! WebSocket realtime channel for push notifications.
//!
//! The `WsChannel` owns one WebSocket connection at a time: it trades the
//! session for a one-time ticket, upgrades `{ws}/api/ws?ticket=...`, and
//! forwards every inbound JSON text message to a notification queue.
//!
//! There is no reconnect loop. Open/close intent comes from the
//! connection gate; if the server drops the socket, `is_connected` turns false
//! and the next reconciliation decides what to do.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::lifecycle::realtime_gate::RealtimeChannel;
use crate::net::api::{ApiError, AuthApi};
use crate::session::Session;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("ws ticket request failed: {0}")]
    Ticket(#[from] ApiError),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    Closed,
}

/// A server push message, e.g. `{"kind":"job:new","payload":{...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn parse_notification(raw: &str) -> Option<Notification> {
    serde_json::from_str(raw).ok()
}

fn ws_endpoint(ws_base_url: &str, ticket: &str) -> String {
    format!("{ws_base_url}/api/ws?ticket={ticket}")
}

struct Connection {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

pub struct WsChannel {
    api: Arc<dyn AuthApi>,
    ws_base_url: String,
    connection: Mutex<Option<Connection>>,
    connected: Arc<AtomicBool>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl WsChannel {
    /// Build a disconnected channel and the queue its notifications land in.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, ws_base_url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            api,
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_owned(),
            connection: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            notifications: tx,
        };
        (channel, rx)
    }
}

async fn read_loop(
    mut source: SplitStream<WsStream>,
    notifications: mpsc::UnboundedSender<Notification>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg) = source.next().await {
        match msg {
            Ok(Message::Text(text)) => match parse_notification(text.as_str()) {
                Some(notification) => {
                    let _ = notifications.send(notification);
                }
                None => debug!(len = text.len(), "ignoring non-notification text message"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "realtime channel receive failed");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    debug!("realtime channel reader finished");
}

#[async_trait]
impl RealtimeChannel for WsChannel {
    async fn connect(&self, session: &Session) -> Result<(), ChannelError> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() && self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(stale) = connection.take() {
            stale.reader.abort();
        }

        let ticket = self.api.create_ws_ticket(session).await?;
        let (stream, _) = connect_async(ws_endpoint(&self.ws_base_url, &ticket))
            .await
            .map_err(|e| ChannelError::Connect(Box::new(e)))?;
        let (sink, source) = stream.split();

        self.connected.store(true, Ordering::SeqCst);
        let reader = tokio::spawn(read_loop(source, self.notifications.clone(), Arc::clone(&self.connected)));
        *connection = Some(Connection { sink, reader });
        info!(subject = %session.subject_id, "realtime channel connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let mut connection = self.connection.lock().await;
        if let Some(mut conn) = connection.take() {
            let _ = conn.sink.send(Message::Close(None)).await;
            let _ = conn.sink.close().await;
            conn.reader.abort();
            info!("realtime channel disconnected");
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "ws_channel_test.rs"]
mod tests;
