//! WebSocket connection to the public relay.
//!
//! One connection per topic, at `{relay_url}?topic={topic}`. The relay
//! forwards text frames between the two parties subscribed to a topic.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use super::{InboundSink, Transport, TransportEvent, TransportHandle};
use crate::error::{BridgeError, Result};

/// WebSocket relay transport using tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    relay_url: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    /// Create a transport for the given relay (`ws://` or `wss://`)
    pub fn new(relay_url: &str) -> Result<Self> {
        let relay_url = Url::parse(relay_url)
            .map_err(|e| BridgeError::Config(format!("Invalid relay URL: {e}")))?;
        if !matches!(relay_url.scheme(), "ws" | "wss") {
            return Err(BridgeError::Config(format!(
                "Relay URL must use ws:// or wss://, got {}",
                relay_url.scheme()
            )));
        }

        Ok(Self {
            relay_url,
            connect_timeout: Duration::from_secs(10),
        })
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Connection URL for a topic
    pub fn topic_url(&self, topic: &str) -> Url {
        let mut url = self.relay_url.clone();
        url.query_pairs_mut().append_pair("topic", topic);
        url
    }

    async fn run(
        url: Url,
        connect_timeout: Duration,
        mut outbound: mpsc::UnboundedReceiver<String>,
        mut shutdown: oneshot::Receiver<()>,
        inbound: InboundSink,
    ) {
        let connect = tokio::select! {
            _ = &mut shutdown => return,
            result = timeout(connect_timeout, connect_async(url.as_str())) => result,
        };

        let ws_stream = match connect {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                inbound(TransportEvent::Error(format!("WebSocket connect failed: {e}")));
                return;
            },
            Err(_) => {
                inbound(TransportEvent::Error("WebSocket connect timeout".to_string()));
                return;
            },
        };

        tracing::debug!(%url, "relay connected");
        inbound(TransportEvent::Connected);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = write.close().await;
                    tracing::debug!(%url, "relay connection closed locally");
                    break;
                }
                Some(frame) = outbound.recv() => {
                    if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                        inbound(TransportEvent::Error(format!("WebSocket send failed: {e}")));
                        break;
                    }
                }
                incoming = read.next() => match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        inbound(TransportEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        inbound(TransportEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        inbound(TransportEvent::Error(format!("WebSocket receive failed: {e}")));
                        break;
                    }
                }
            }
        }
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, topic: &str, inbound: InboundSink) -> Result<TransportHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeError::Transport(format!("No tokio runtime: {e}")))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let url = self.topic_url(topic);

        runtime.spawn(Self::run(
            url,
            self.connect_timeout,
            outbound_rx,
            shutdown_rx,
            inbound,
        ));

        Ok(TransportHandle::new(outbound_tx, shutdown_tx))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_rejects_non_websocket_urls() {
        assert!(WebSocketTransport::new("https://relay.example.org").is_err());
        assert!(WebSocketTransport::new("not a url").is_err());
        assert!(WebSocketTransport::new("wss://relay.example.org").is_ok());
    }

    #[test]
    fn test_topic_url() {
        let transport = WebSocketTransport::new("wss://relay.example.org/v1").unwrap();
        assert_eq!(
            transport.topic_url("abc 456").as_str(),
            "wss://relay.example.org/v1?topic=abc+456"
        );
    }

    #[test]
    fn test_open_requires_runtime() {
        let transport = WebSocketTransport::new("wss://relay.example.org").unwrap();
        let result = transport.open("t", Arc::new(|_| {}));
        assert!(matches!(result, Err(BridgeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_relay_reports_error() {
        let transport = WebSocketTransport::new("ws://127.0.0.1:9")
            .unwrap()
            .with_connect_timeout(Duration::from_secs(2));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: InboundSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });

        let _handle = transport.open("t", sink).unwrap();
        let event = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(matches!(event, Some(TransportEvent::Error(_))));
    }
}
