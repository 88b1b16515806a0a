//! In-process transport backed by tokio channels.
//!
//! Every `open` creates a [`ChannelPeer`] standing in for the relay on the
//! far side of the connection. Whoever holds the peer can push frames into
//! the session and read what the session sent back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use super::{InboundSink, Transport, TransportEvent, TransportHandle};
use crate::error::Result;

/// Far end of one in-process connection
pub struct ChannelPeer {
    topic: String,
    inbound: InboundSink,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: oneshot::Receiver<()>,
    closed: bool,
}

impl ChannelPeer {
    /// Topic the connection was opened for
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Report the connection as up
    pub fn connect(&self) {
        (self.inbound)(TransportEvent::Connected);
    }

    /// Deliver a frame to the session
    pub fn inject(&self, frame: impl Into<String>) {
        (self.inbound)(TransportEvent::Message(frame.into()));
    }

    /// Report a connection failure
    pub fn fail(&self, reason: impl Into<String>) {
        (self.inbound)(TransportEvent::Error(reason.into()));
    }

    /// Report the relay hanging up
    pub fn close(&self) {
        (self.inbound)(TransportEvent::Closed);
    }

    /// Next frame the session sent, if any
    pub fn recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Every frame the session sent so far
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.recv()).collect()
    }

    /// Whether the session closed its handle
    pub fn is_closed(&mut self) -> bool {
        if !self.closed {
            self.closed = !matches!(self.shutdown.try_recv(), Err(TryRecvError::Empty));
        }
        self.closed
    }
}

impl std::fmt::Debug for ChannelPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPeer")
            .field("topic", &self.topic)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Transport whose connections are in-process channel pairs
#[derive(Default)]
pub struct ChannelTransport {
    peers: Mutex<HashMap<String, ChannelPeer>>,
    opened: AtomicUsize,
}

impl ChannelTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the peer for a topic's most recent connection
    pub fn take_peer(&self, topic: &str) -> Option<ChannelPeer> {
        self.peers.lock().remove(topic)
    }

    /// Total connections opened
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Transport for ChannelTransport {
    fn open(&self, topic: &str, inbound: InboundSink) -> Result<TransportHandle> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let peer = ChannelPeer {
            topic: topic.to_string(),
            inbound,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            closed: false,
        };
        self.peers.lock().insert(topic.to_string(), peer);
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(TransportHandle::new(outbound_tx, shutdown_tx))
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_open_and_exchange() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: InboundSink = Arc::new(move |event| sink_seen.lock().push(event));

        let transport = ChannelTransport::new();
        let mut handle = transport.open("t1", sink).unwrap();
        assert_eq!(transport.opened(), 1);

        let mut peer = transport.take_peer("t1").unwrap();
        assert_eq!(peer.topic(), "t1");
        peer.connect();
        peer.inject("ping");
        peer.fail("reset");
        assert_eq!(
            *seen.lock(),
            vec![
                TransportEvent::Connected,
                TransportEvent::Message("ping".into()),
                TransportEvent::Error("reset".into()),
            ]
        );

        handle.send("a".into()).unwrap();
        handle.send("b".into()).unwrap();
        assert_eq!(peer.drain(), vec!["a", "b"]);

        assert!(!peer.is_closed());
        handle.close();
        assert!(peer.is_closed());
        assert!(peer.is_closed());
    }

    #[test]
    fn test_dropping_handle_closes_peer() {
        let transport = ChannelTransport::new();
        let handle = transport.open("t2", Arc::new(|_| {})).unwrap();
        let mut peer = transport.take_peer("t2").unwrap();
        drop(handle);
        assert!(peer.is_closed());
    }
}
