//! Relay transport abstraction.
//!
//! Each session owns exactly one connection to the relay, scoped to its
//! topic. A [`Transport`] opens that connection and reports everything that
//! happens on it through an [`InboundSink`] as an ordered sequence of
//! [`TransportEvent`]s; frames going the other way are pushed into the
//! returned [`TransportHandle`].
//!
//! ```text
//! ┌────────────────────┐  TransportEvent   ┌─────────────────┐
//! │ connection task    │ ────────────────> │ Bridge::deliver │
//! │ (one per topic)    │ <──────────────── │                 │
//! └────────────────────┘  TransportHandle  └─────────────────┘
//! ```
//!
//! Backends:
//! - [`WebSocketTransport`]: WebSocket connection to the public relay
//!   (feature `websocket`)
//! - [`ChannelTransport`]: in-process channels, for tests and embedders that
//!   bring their own connection

mod channel;
#[cfg(feature = "websocket")]
mod websocket;

pub use channel::{ChannelPeer, ChannelTransport};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{BridgeError, Result};

/// Something that happened on a session's relay connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection to the relay is up
    Connected,
    /// Text frame received
    Message(String),
    /// Connection-level failure
    Error(String),
    /// Connection closed by the relay
    Closed,
}

/// Receiver of a connection's events, called in arrival order
pub type InboundSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Opens relay connections.
///
/// `open` must not call `inbound` synchronously; events are delivered later
/// from the connection's own task or thread.
pub trait Transport: Send + Sync {
    /// Open a connection scoped to `topic`
    fn open(&self, topic: &str, inbound: InboundSink) -> Result<TransportHandle>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}

/// Owning handle to one live relay connection.
///
/// Dropping or closing the handle shuts the connection down.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportHandle {
    /// Wrap the two channel ends a connection task listens on
    pub fn new(outbound: mpsc::UnboundedSender<String>, shutdown: oneshot::Sender<()>) -> Self {
        Self {
            outbound,
            shutdown: Some(shutdown),
        }
    }

    /// Queue a frame for sending.
    pub fn send(&self, frame: String) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| BridgeError::Transport("Connection closed".to_string()))
    }

    /// Sender that can be used without holding the session
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.outbound.clone()
    }

    /// Shut the connection down. Idempotent.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }

    /// Whether [`TransportHandle::close`] has been called or the connection
    /// task has gone away
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none() || self.outbound.is_closed()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}
