//! Arena of live sessions keyed by topic.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Session, Topic};
use crate::config::ServiceInfo;
use crate::crypto::{EncryptionGateway, KeyPair, PublicKey};
use crate::error::{ConfigError, Result};
use crate::events::{fire_all, Callback, Event, EventKind};
use crate::protocol::{ProtocolHandler, SessionState};
use crate::transport::{InboundSink, Transport, TransportEvent};

/// Error message reported when the relay drops a live session's connection
pub const RELAY_CLOSED: &str = "relay connection closed";

/// Owns every live [`Session`].
///
/// All mutation happens under one lock. Callbacks and outbound sends are
/// collected while it is held and run after it is released, so a callback
/// may call back into the registry.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Topic, Session>>,
    handler: ProtocolHandler,
    transport: Arc<dyn Transport>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(gateway: Arc<dyn EncryptionGateway>, transport: Arc<dyn Transport>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            handler: ProtocolHandler::new(gateway),
            transport,
        }
    }

    /// Create a session and open its relay connection.
    ///
    /// `inbound` builds the sink the connection reports into; it is called
    /// once with the final topic.
    pub fn create<F>(
        &self,
        topic: Option<Topic>,
        key_pair: Option<KeyPair>,
        service: ServiceInfo,
        inbound: F,
    ) -> Result<Topic>
    where
        F: FnOnce(&Topic) -> InboundSink,
    {
        let key_pair = match key_pair {
            Some(key_pair) => key_pair,
            None => self.handler.gateway().generate_key_pair(),
        };

        let mut sessions = self.sessions.lock();

        let topic = match topic {
            Some(topic) => {
                if sessions.contains_key(&topic) {
                    return Err(ConfigError::DuplicateTopic(topic.to_string()).into());
                }
                topic
            },
            None => loop {
                let candidate = Topic::random();
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let mut session = Session::new(topic.clone(), key_pair, service);
        let handle = self.transport.open(topic.as_str(), inbound(&topic))?;
        session.attach_transport(handle);
        sessions.insert(topic.clone(), session);

        tracing::debug!(
            topic = %topic,
            transport = self.transport.name(),
            active = sessions.len(),
            "session created"
        );
        Ok(topic)
    }

    /// Run `f` against a live session
    pub fn with_session<R>(&self, topic: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.lock().get_mut(topic).map(f)
    }

    /// Route one connection event to its session
    pub fn deliver(&self, topic: &str, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                if self.with_session(topic, Session::mark_connected).is_none() {
                    tracing::debug!(topic, "connect for unknown topic dropped");
                }
            },
            TransportEvent::Message(frame) => self.deliver_frame(topic, &frame),
            TransportEvent::Error(message) => {
                let Some(callbacks) =
                    self.with_session(topic, |s| s.dispatcher().callbacks(EventKind::Error))
                else {
                    tracing::debug!(topic, "transport error for unknown topic dropped");
                    return;
                };
                report_connection_error(topic, &callbacks, message);
            },
            TransportEvent::Closed => {
                let Some((state, callbacks)) = self.with_session(topic, |s| {
                    (s.state(), s.dispatcher().callbacks(EventKind::Error))
                }) else {
                    tracing::debug!(topic, "close for unknown topic dropped");
                    return;
                };
                if state.is_terminal() {
                    tracing::info!(topic, state = %state, "relay connection closed");
                } else {
                    report_connection_error(topic, &callbacks, RELAY_CLOSED.to_string());
                }
            },
        }
    }

    /// Process one frame with the lock released, then apply the outcome.
    ///
    /// If the session moved on while the frame was being processed the frame
    /// is processed again against the new state.
    fn deliver_frame(&self, topic: &str, frame: &str) {
        loop {
            let Some(snapshot) = self.with_session(topic, |s| s.snapshot()) else {
                tracing::debug!(topic, "frame for unknown topic dropped");
                return;
            };
            let outcome = self.handler.handle(snapshot.view(), frame);

            let effects = self.with_session(topic, |session| {
                snapshot.is_current(session).then(|| session.apply(outcome))
            });
            match effects {
                Some(Some(effects)) => return effects.run(),
                Some(None) => tracing::debug!(topic, "session changed during frame, reprocessing"),
                None => {
                    tracing::debug!(topic, "session removed during frame, dropped");
                    return;
                },
            }
        }
    }

    /// Tear a session down. Returns whether it existed.
    pub fn destroy(&self, topic: &str) -> bool {
        let removed = self.sessions.lock().remove(topic);
        match removed {
            Some(mut session) => {
                session.teardown();
                tracing::debug!(topic, age_ms = session.age().as_millis(), "session destroyed");
                true
            },
            None => false,
        }
    }

    /// Whether a session exists
    pub fn contains(&self, topic: &str) -> bool {
        self.sessions.lock().contains_key(topic)
    }

    /// Current state of a session
    pub fn state(&self, topic: &str) -> Option<SessionState> {
        self.with_session(topic, |s| s.state())
    }

    /// Whether a session has agreed its shared secret
    pub fn is_handshake_complete(&self, topic: &str) -> Option<bool> {
        self.with_session(topic, |s| s.is_handshake_complete())
    }

    /// Public key a session advertises in its request URL
    pub fn public_key(&self, topic: &str) -> Option<PublicKey> {
        self.with_session(topic, |s| *s.public_key())
    }

    /// Topics of all live sessions
    pub fn topics(&self) -> Vec<Topic> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Get session count
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

fn report_connection_error(topic: &str, callbacks: &[Callback], message: String) {
    if callbacks.is_empty() {
        tracing::warn!(topic, error = %message, "relay connection error");
    } else {
        fire_all(callbacks, &Event::Error { message });
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}
