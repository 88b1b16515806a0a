//! End-to-end WebSocket transport tests.
//!
//! A local relay stub accepts the bridge's connection and plays the wallet,
//! so these run against a real socket without network access.

#![cfg(feature = "websocket")]

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use idbridge::protocol::RelayMessage;
use idbridge::session::RELAY_CLOSED;
use idbridge::{
    Bridge, BridgeConfig, EncryptionGateway, KeyPair, PublicKey, RequestDescriptor,
    RequestOptions, RpcMessage, SessionState, SharedSecret, X25519Gateway,
};

const WAIT: Duration = Duration::from_secs(5);

type RelaySocket = WebSocketStream<tokio::net::TcpStream>;

fn query(descriptor: &RequestDescriptor, name: &str) -> String {
    descriptor
        .url
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

/// Accept one relay connection, returning it and the requested URI
async fn accept(listener: &TcpListener) -> (RelaySocket, String) {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let uri = Arc::new(Mutex::new(String::new()));
    let seen = Arc::clone(&uri);
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *seen.lock() = req.uri().to_string();
        Ok(resp)
    };
    let ws = timeout(WAIT, accept_hdr_async(stream, callback))
        .await
        .unwrap()
        .unwrap();
    let uri = uri.lock().clone();
    (ws, uri)
}

async fn next_text(ws: &mut RelaySocket) -> String {
    loop {
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn wait_for_state(bridge: &Bridge, topic: &str, want: SessionState) {
    timeout(WAIT, async {
        while bridge.state(topic) != Some(want) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn open(secret: &SharedSecret, frame: &str, topic: &str) -> RpcMessage {
    let frame = RpcMessage::from_json(frame).unwrap();
    let RelayMessage::Encrypted { payload } = RelayMessage::parse(&frame).unwrap() else {
        panic!("expected an encrypted frame");
    };
    let pt = X25519Gateway::new()
        .decrypt(&STANDARD.decode(payload).unwrap(), secret, topic)
        .unwrap();
    RpcMessage::from_slice(&pt).unwrap()
}

fn seal(secret: &SharedSecret, inner: &RpcMessage, topic: &str) -> String {
    let ct = X25519Gateway::new()
        .encrypt(inner.to_json().unwrap().as_bytes(), secret, topic)
        .unwrap();
    RpcMessage::encrypted(&STANDARD.encode(ct)).to_json().unwrap()
}

#[tokio::test]
async fn test_full_flow_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = BridgeConfig::default().with_relay_url(format!("ws://127.0.0.1:{port}/relay"));
    let bridge = Bridge::new(config).unwrap();

    let descriptor = bridge
        .request(RequestOptions::default())
        .unwrap()
        .gte("age", 18)
        .unwrap()
        .done()
        .unwrap();
    let topic = descriptor.topic.to_string();

    let (tx, mut events) = mpsc::unbounded_channel::<String>();
    let (scanned, proof) = (tx.clone(), tx);
    descriptor
        .subscriptions
        .on_qr_code_scanned(move || {
            let _ = scanned.send("scanned".to_string());
        })
        .unwrap()
        .on_proof_generated(move |p| {
            let _ = proof.send(format!("proof:{p}"));
        })
        .unwrap();

    let (mut relay, uri) = accept(&listener).await;
    assert_eq!(uri, format!("/relay?topic={topic}"));
    wait_for_state(&bridge, &topic, SessionState::AwaitingHandshake).await;

    // Wallet scans and handshakes
    let wallet = KeyPair::generate();
    let app_public = PublicKey::from_hex(&query(&descriptor, "p")).unwrap();
    let secret = X25519Gateway::new()
        .derive_shared_secret(&wallet, &app_public)
        .unwrap();
    relay
        .send(Message::text(
            RpcMessage::handshake(&wallet.public_key().to_hex())
                .to_json()
                .unwrap(),
        ))
        .await
        .unwrap();

    let hello = open(&secret, &next_text(&mut relay).await, &topic);
    assert_eq!(hello.method, "hello");
    assert_eq!(timeout(WAIT, events.recv()).await.unwrap().unwrap(), "scanned");

    relay
        .send(Message::text(seal(&secret, &RpcMessage::done("deadbeef"), &topic)))
        .await
        .unwrap();
    assert_eq!(
        timeout(WAIT, events.recv()).await.unwrap().unwrap(),
        "proof:deadbeef"
    );
    assert_eq!(bridge.state(&topic), Some(SessionState::Completed));

    // Cancelling closes the socket
    assert!(bridge.cancel_request(&topic));
    let closed = timeout(WAIT, async {
        loop {
            match relay.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {},
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_unreachable_relay_reaches_on_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = BridgeConfig::default()
        .with_relay_url(format!("ws://127.0.0.1:{port}"))
        .with_connect_timeout(Duration::from_secs(2));
    let bridge = Bridge::new(config).unwrap();

    let descriptor = bridge
        .request(RequestOptions::default())
        .unwrap()
        .done()
        .unwrap();

    let (tx, mut errors) = mpsc::unbounded_channel::<String>();
    descriptor
        .subscriptions
        .on_error(move |message| {
            let _ = tx.send(message.to_string());
        })
        .unwrap();

    let message = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(message.contains("WebSocket connect"));
    assert_eq!(
        bridge.state(descriptor.topic.as_str()),
        Some(SessionState::Created)
    );
}

#[tokio::test]
async fn test_relay_close_reaches_on_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let bridge = Bridge::new(
        BridgeConfig::default().with_relay_url(format!("ws://127.0.0.1:{port}")),
    )
    .unwrap();

    let descriptor = bridge
        .request(RequestOptions::default())
        .unwrap()
        .done()
        .unwrap();
    let topic = descriptor.topic.to_string();

    let (tx, mut errors) = mpsc::unbounded_channel::<String>();
    descriptor
        .subscriptions
        .on_error(move |message| {
            let _ = tx.send(message.to_string());
        })
        .unwrap();

    let (mut relay, _uri) = accept(&listener).await;
    wait_for_state(&bridge, &topic, SessionState::AwaitingHandshake).await;

    relay.close(None).await.unwrap();
    let message = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert_eq!(message, RELAY_CLOSED);

    // The caller decides what to do with a request whose relay went away
    assert_eq!(bridge.state(&topic), Some(SessionState::AwaitingHandshake));
    assert!(bridge.cancel_request(&topic));
}
