//! Inbound frame processing for one session.
//!
//! [`ProtocolHandler::process`] is a pure function of the session's current
//! view and one relay frame. It returns an [`Outcome`] describing what should
//! happen (state change, secret to install, frames to send, events to fire);
//! the caller applies it. Nothing here touches the transport or callbacks.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::message::{InnerMessage, RelayMessage, RpcMessage};
use super::state::SessionState;
use crate::crypto::{CryptoError, EncryptionGateway, KeyPair, PublicKey, SharedSecret};
use crate::error::{BridgeError, Result};
use crate::events::Event;

/// Read-only view of the session fields the handler needs
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    /// Session topic, also the encryption context
    pub topic: &'a str,
    /// Session identity key pair
    pub key_pair: &'a KeyPair,
    /// Shared secret, once the handshake completed
    pub shared_secret: Option<&'a SharedSecret>,
    /// Current lifecycle state
    pub state: SessionState,
}

/// Effects of processing one frame
#[derive(Debug, Default)]
pub struct Outcome {
    /// New lifecycle state, if it changes
    pub next_state: Option<SessionState>,
    /// Shared secret to install (handshake only)
    pub shared_secret: Option<SharedSecret>,
    /// Serialized frames to send back through the relay
    pub outbound: Vec<String>,
    /// Events to fire on the session's dispatcher
    pub events: Vec<Event>,
}

impl Outcome {
    /// Outcome that changes nothing
    pub fn none() -> Self {
        Self::default()
    }

    fn transition(next: SessionState, event: Event) -> Self {
        Self {
            next_state: Some(next),
            events: vec![event],
            ..Self::default()
        }
    }

    /// True when applying the outcome has no effect
    pub fn is_empty(&self) -> bool {
        self.next_state.is_none()
            && self.shared_secret.is_none()
            && self.outbound.is_empty()
            && self.events.is_empty()
    }
}

/// Drives the session state machine from relay frames
#[derive(Clone)]
pub struct ProtocolHandler {
    gateway: Arc<dyn EncryptionGateway>,
}

impl ProtocolHandler {
    /// Create a handler using the given gateway
    pub fn new(gateway: Arc<dyn EncryptionGateway>) -> Self {
        Self { gateway }
    }

    /// Gateway used for key agreement and envelopes
    pub fn gateway(&self) -> &Arc<dyn EncryptionGateway> {
        &self.gateway
    }

    /// Process a frame, logging and swallowing any error.
    ///
    /// A failed frame leaves the session exactly as it was.
    pub fn handle(&self, session: SessionView<'_>, frame: &str) -> Outcome {
        match self.process(session, frame) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    topic = session.topic,
                    state = %session.state,
                    error = %e,
                    "{}",
                    drop_reason(&e)
                );
                Outcome::none()
            },
        }
    }

    /// Process a frame, returning the error instead of logging it.
    pub fn process(&self, session: SessionView<'_>, frame: &str) -> Result<Outcome> {
        let message = RpcMessage::from_json(frame)?;

        match RelayMessage::parse(&message)? {
            RelayMessage::Handshake { pubkey } => self.process_handshake(session, &pubkey),
            RelayMessage::Encrypted { payload } => self.process_encrypted(session, &payload),
        }
    }

    fn process_handshake(&self, session: SessionView<'_>, pubkey: &str) -> Result<Outcome> {
        if session.shared_secret.is_some() {
            return Err(BridgeError::Protocol(
                "Shared secret already established, ignoring repeated handshake".to_string(),
            ));
        }
        if !session.state.awaits_handshake() {
            return Err(BridgeError::Protocol(format!(
                "Cannot process handshake in state {}",
                session.state
            )));
        }

        let peer = PublicKey::from_hex(pubkey)?;
        let secret = self
            .gateway
            .derive_shared_secret(session.key_pair, &peer)?;

        let hello = RpcMessage::hello().to_json()?;
        let ciphertext = self
            .gateway
            .encrypt(hello.as_bytes(), &secret, session.topic)?;
        let frame = RpcMessage::encrypted(&STANDARD.encode(ciphertext)).to_json()?;

        tracing::debug!(topic = session.topic, "handshake complete");

        Ok(Outcome {
            next_state: Some(SessionState::Established),
            shared_secret: Some(secret),
            outbound: vec![frame],
            events: vec![Event::QrCodeScanned],
        })
    }

    fn process_encrypted(&self, session: SessionView<'_>, payload: &str) -> Result<Outcome> {
        let secret = session
            .shared_secret
            .ok_or(CryptoError::MissingSharedSecret)?;
        let ciphertext = STANDARD.decode(payload)?;
        let plaintext = self.gateway.decrypt(&ciphertext, secret, session.topic)?;
        let inner = RpcMessage::from_slice(&plaintext)?;

        let (next, event) = match InnerMessage::parse(&inner)? {
            InnerMessage::Accept => (
                SessionState::GeneratingProof,
                Event::GeneratingProof {
                    topic: session.topic.to_string(),
                },
            ),
            InnerMessage::Reject => (SessionState::Rejected, Event::Reject),
            InnerMessage::Done { proof } => (SessionState::Completed, Event::ProofGenerated { proof }),
            InnerMessage::Error { error } => (SessionState::Failed, Event::Error { message: error }),
            InnerMessage::Unknown(method) => {
                tracing::debug!(topic = session.topic, %method, "ignoring unknown inner method");
                return Ok(Outcome::none());
            },
        };

        if !session.state.can_transition_to(next) {
            return Err(BridgeError::Protocol(format!(
                "Cannot process {} in state {}",
                inner.method, session.state
            )));
        }

        tracing::debug!(topic = session.topic, from = %session.state, to = %next, "session transition");
        Ok(Outcome::transition(next, event))
    }
}

/// Log line for a frame the handler refused
fn drop_reason(err: &BridgeError) -> &'static str {
    match err {
        BridgeError::Crypto(e) if e.is_authentication_failure() => {
            "dropping message that failed authentication"
        },
        BridgeError::Crypto(CryptoError::MissingSharedSecret) => {
            "dropping encrypted message received before handshake"
        },
        BridgeError::Crypto(_) => "dropping handshake, key agreement failed",
        _ => "dropping malformed or unexpected message",
    }
}

impl std::fmt::Debug for ProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::X25519Gateway;

    const TOPIC: &str = "abc456";

    struct Fixture {
        handler: ProtocolHandler,
        app: KeyPair,
        wallet: KeyPair,
        secret: Option<SharedSecret>,
        state: SessionState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                handler: ProtocolHandler::new(Arc::new(X25519Gateway::new())),
                app: KeyPair::generate(),
                wallet: KeyPair::generate(),
                secret: None,
                state: SessionState::Created,
            }
        }

        fn view(&self) -> SessionView<'_> {
            SessionView {
                topic: TOPIC,
                key_pair: &self.app,
                shared_secret: self.secret.as_ref(),
                state: self.state,
            }
        }

        fn feed(&mut self, frame: &str) -> Outcome {
            let mut outcome = self.handler.handle(self.view(), frame);
            if let Some(secret) = outcome.shared_secret.take() {
                self.secret = Some(secret);
            }
            if let Some(next) = outcome.next_state {
                self.state = next;
            }
            outcome
        }

        fn handshake(&mut self) -> Outcome {
            let frame = RpcMessage::handshake(&self.wallet.public_key().to_hex())
                .to_json()
                .unwrap();
            self.feed(&frame)
        }

        fn wallet_secret(&self) -> SharedSecret {
            X25519Gateway::new()
                .derive_shared_secret(&self.wallet, self.app.public_key())
                .unwrap()
        }

        fn wallet_frame(&self, inner: &RpcMessage) -> String {
            let ct = X25519Gateway::new()
                .encrypt(inner.to_json().unwrap().as_bytes(), &self.wallet_secret(), TOPIC)
                .unwrap();
            RpcMessage::encrypted(&STANDARD.encode(ct)).to_json().unwrap()
        }
    }

    #[test]
    fn test_handshake_establishes_and_says_hello() {
        let mut fx = Fixture::new();
        let outcome = fx.handshake();

        assert_eq!(fx.state, SessionState::Established);
        assert!(fx.secret.is_some());
        assert_eq!(outcome.events, vec![Event::QrCodeScanned]);
        assert_eq!(outcome.outbound.len(), 1);

        // Wallet can decrypt the hello with its side of the secret
        let frame = RpcMessage::from_json(&outcome.outbound[0]).unwrap();
        let RelayMessage::Encrypted { payload } = RelayMessage::parse(&frame).unwrap() else {
            panic!("hello must travel encrypted");
        };
        let pt = X25519Gateway::new()
            .decrypt(&STANDARD.decode(payload).unwrap(), &fx.wallet_secret(), TOPIC)
            .unwrap();
        assert_eq!(RpcMessage::from_slice(&pt).unwrap().method, "hello");
    }

    #[test]
    fn test_repeated_handshake_keeps_secret() {
        let mut fx = Fixture::new();
        fx.handshake();
        let before = fx.secret.clone().unwrap();

        fx.wallet = KeyPair::generate();
        let outcome = fx.handshake();

        assert!(outcome.is_empty());
        assert_eq!(fx.secret.unwrap(), before);
    }

    #[test]
    fn test_accept_then_done() {
        let mut fx = Fixture::new();
        fx.handshake();

        let outcome = fx.feed(&fx.wallet_frame(&RpcMessage::accept()));
        assert_eq!(
            outcome.events,
            vec![Event::GeneratingProof { topic: TOPIC.into() }]
        );
        assert_eq!(fx.state, SessionState::GeneratingProof);

        let outcome = fx.feed(&fx.wallet_frame(&RpcMessage::done("deadbeef")));
        assert_eq!(
            outcome.events,
            vec![Event::ProofGenerated { proof: "deadbeef".into() }]
        );
        assert_eq!(fx.state, SessionState::Completed);
    }

    #[test]
    fn test_reject_and_error() {
        let mut fx = Fixture::new();
        fx.handshake();
        let outcome = fx.feed(&fx.wallet_frame(&RpcMessage::reject()));
        assert_eq!(outcome.events, vec![Event::Reject]);
        assert_eq!(fx.state, SessionState::Rejected);

        let mut fx = Fixture::new();
        fx.handshake();
        let outcome = fx.feed(&fx.wallet_frame(&RpcMessage::error("no nfc")));
        assert_eq!(outcome.events, vec![Event::Error { message: "no nfc".into() }]);
        assert_eq!(fx.state, SessionState::Failed);
    }

    #[test]
    fn test_encrypted_before_handshake_is_dropped() {
        let fx = Fixture::new();
        let frame = RpcMessage::encrypted("not*base64").to_json().unwrap();

        let err = fx.handler.process(fx.view(), &frame).unwrap_err();
        assert!(matches!(err, BridgeError::Crypto(CryptoError::MissingSharedSecret)));
        assert_eq!(
            drop_reason(&err),
            "dropping encrypted message received before handshake"
        );
        assert!(fx.handler.handle(fx.view(), &frame).is_empty());
    }

    #[test]
    fn test_low_order_handshake_key_is_key_agreement_failure() {
        let mut fx = Fixture::new();
        let zero = PublicKey::from_bytes([0u8; 32]);
        let frame = RpcMessage::handshake(&zero.to_hex()).to_json().unwrap();

        let err = fx.handler.process(fx.view(), &frame).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Crypto(CryptoError::InvalidPublicKey(_))
        ));
        assert_eq!(drop_reason(&err), "dropping handshake, key agreement failed");

        let bad_hex = RpcMessage::handshake("zz").to_json().unwrap();
        let err = fx.handler.process(fx.view(), &bad_hex).unwrap_err();
        assert_eq!(drop_reason(&err), "dropping handshake, key agreement failed");

        assert!(fx.feed(&frame).is_empty());
        assert_eq!(fx.state, SessionState::Created);
        assert!(fx.secret.is_none());
    }

    #[test]
    fn test_tampered_payload_is_dropped() {
        let mut fx = Fixture::new();
        fx.handshake();

        let frame = fx.wallet_frame(&RpcMessage::accept());
        let message = RpcMessage::from_json(&frame).unwrap();
        let RelayMessage::Encrypted { payload } = RelayMessage::parse(&message).unwrap() else {
            unreachable!()
        };
        let mut bytes = STANDARD.decode(payload).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = RpcMessage::encrypted(&STANDARD.encode(bytes)).to_json().unwrap();

        let err = fx.handler.process(fx.view(), &tampered).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Crypto(CryptoError::DecryptionFailed(_))
        ));
        assert_eq!(drop_reason(&err), "dropping message that failed authentication");
        assert_eq!(
            drop_reason(&BridgeError::Protocol("x".into())),
            "dropping malformed or unexpected message"
        );
        assert!(fx.feed(&tampered).is_empty());
        assert_eq!(fx.state, SessionState::Established);

        // Still responsive afterwards
        fx.feed(&frame);
        assert_eq!(fx.state, SessionState::GeneratingProof);
    }

    #[test]
    fn test_unknown_inner_method_ignored() {
        let mut fx = Fixture::new();
        fx.handshake();
        let inner = RpcMessage::request("progress", serde_json::json!({"pct": 50}));
        assert!(fx.feed(&fx.wallet_frame(&inner)).is_empty());
        assert_eq!(fx.state, SessionState::Established);
    }

    #[test]
    fn test_messages_after_terminal_state_ignored() {
        let mut fx = Fixture::new();
        fx.handshake();
        fx.feed(&fx.wallet_frame(&RpcMessage::reject()));

        let outcome = fx.feed(&fx.wallet_frame(&RpcMessage::done("00")));
        assert!(outcome.is_empty());
        assert_eq!(fx.state, SessionState::Rejected);
    }

    #[test]
    fn test_garbage_frames() {
        let mut fx = Fixture::new();
        assert!(fx.feed("not json").is_empty());
        assert!(fx.feed(r#"{"method":"subscribe","params":{}}"#).is_empty());
        let bad_key = RpcMessage::handshake("1234").to_json().unwrap();
        assert!(fx.feed(&bad_key).is_empty());
        assert_eq!(fx.state, SessionState::Created);
        assert!(fx.secret.is_none());
    }
}
