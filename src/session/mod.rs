//! Per-request session state.
//!
//! A [`Session`] owns everything that belongs to one outstanding request: its
//! identity key pair, the shared secret once agreed, the credential
//! configuration, the relay connection and its own callback registries.
//! Sessions live in a [`SessionRegistry`] keyed by [`Topic`]; destroying the
//! entry drops all of it at once.

mod registry;
mod topic;

pub use registry::{SessionRegistry, RELAY_CLOSED};
pub use topic::{Topic, TOPIC_ENTROPY_BYTES};

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::config::ServiceInfo;
use crate::crypto::{KeyPair, PublicKey, SharedSecret};
use crate::events::{fire_all, Callback, Event, EventDispatcher};
use crate::protocol::{Outcome, SessionState, SessionView};
use crate::request::RequestConfig;
use crate::transport::TransportHandle;

/// Handler inputs copied out of a [`Session`]
pub(crate) struct SessionSnapshot {
    topic: Topic,
    key_pair: KeyPair,
    shared_secret: Option<SharedSecret>,
    state: SessionState,
}

impl SessionSnapshot {
    pub(crate) fn view(&self) -> SessionView<'_> {
        SessionView {
            topic: self.topic.as_str(),
            key_pair: &self.key_pair,
            shared_secret: self.shared_secret.as_ref(),
            state: self.state,
        }
    }

    /// Whether `session` is still the one this was taken from, unchanged
    pub(crate) fn is_current(&self, session: &Session) -> bool {
        session.state == self.state
            && session.shared_secret == self.shared_secret
            && session.key_pair.public_key() == self.key_pair.public_key()
    }
}

/// One outstanding credential request
pub struct Session {
    topic: Topic,
    key_pair: KeyPair,
    shared_secret: Option<SharedSecret>,
    config: RequestConfig,
    service: ServiceInfo,
    transport: Option<TransportHandle>,
    dispatcher: EventDispatcher,
    state: SessionState,
    created_at: Instant,
}

impl Session {
    /// Create a session in the `Created` state
    pub fn new(topic: Topic, key_pair: KeyPair, service: ServiceInfo) -> Self {
        Self {
            topic,
            key_pair,
            shared_secret: None,
            config: RequestConfig::new(),
            service,
            transport: None,
            dispatcher: EventDispatcher::new(),
            state: SessionState::Created,
            created_at: Instant::now(),
        }
    }

    /// Get session topic
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Public half of the session key pair
    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the shared secret has been agreed
    pub fn is_handshake_complete(&self) -> bool {
        self.shared_secret.is_some()
    }

    /// Credential configuration
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Mutable credential configuration
    pub fn config_mut(&mut self) -> &mut RequestConfig {
        &mut self.config
    }

    /// Requesting service details
    pub fn service(&self) -> &ServiceInfo {
        &self.service
    }

    /// Callback registries
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Mutable callback registries
    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Time since the session was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether a relay connection is attached and open
    pub fn has_open_transport(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_closed())
    }

    pub(crate) fn attach_transport(&mut self, handle: TransportHandle) {
        if let Some(mut previous) = self.transport.replace(handle) {
            previous.close();
        }
    }

    /// Owned copy of the handler inputs, usable once the lock is released
    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            topic: self.topic.clone(),
            key_pair: self.key_pair.clone(),
            shared_secret: self.shared_secret.clone(),
            state: self.state,
        }
    }

    /// Relay reported the connection as up
    pub fn mark_connected(&mut self) {
        if self.state.can_transition_to(SessionState::AwaitingHandshake) {
            self.state = SessionState::AwaitingHandshake;
        }
    }

    /// Apply a handler outcome.
    ///
    /// Returns the side effects that must run after the registry lock is
    /// released.
    pub fn apply(&mut self, outcome: Outcome) -> Effects {
        if let Some(secret) = outcome.shared_secret {
            if self.shared_secret.is_some() {
                tracing::warn!(topic = %self.topic, "refusing to replace shared secret");
                return Effects::empty(self.topic.clone());
            }
            self.shared_secret = Some(secret);
        }

        if let Some(next) = outcome.next_state {
            self.state = next;
        }

        let sender = if outcome.outbound.is_empty() {
            None
        } else {
            self.transport.as_ref().map(TransportHandle::sender)
        };

        let notifications = outcome
            .events
            .into_iter()
            .map(|event| {
                let callbacks = self.dispatcher.callbacks(event.kind());
                (event, callbacks)
            })
            .collect();

        Effects {
            topic: self.topic.clone(),
            frames: outcome.outbound,
            sender,
            notifications,
        }
    }

    /// Close the connection and purge keys, configuration and callbacks
    pub(crate) fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.shared_secret = None;
        self.config = RequestConfig::new();
        self.dispatcher.clear();
        if self.state.can_transition_to(SessionState::Cancelled) {
            self.state = SessionState::Cancelled;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("topic", &self.topic)
            .field("state", &self.state)
            .field("handshake_complete", &self.is_handshake_complete())
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Side effects of an applied outcome, run outside the registry lock
pub struct Effects {
    topic: Topic,
    frames: Vec<String>,
    sender: Option<mpsc::UnboundedSender<String>>,
    notifications: Vec<(Event, Vec<Callback>)>,
}

impl Effects {
    fn empty(topic: Topic) -> Self {
        Self {
            topic,
            frames: Vec::new(),
            sender: None,
            notifications: Vec::new(),
        }
    }

    /// Send queued frames, then fire callbacks in event order
    pub fn run(self) {
        if !self.frames.is_empty() {
            match &self.sender {
                Some(sender) => {
                    for frame in self.frames {
                        if sender.send(frame).is_err() {
                            tracing::warn!(topic = %self.topic, "relay connection closed, frame dropped");
                            break;
                        }
                    }
                },
                None => tracing::warn!(topic = %self.topic, "no relay connection, frames dropped"),
            }
        }

        for (event, callbacks) in &self.notifications {
            fire_all(callbacks, event);
        }
    }

    /// Events this run will fire
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.notifications.iter().map(|(event, _)| event)
    }
}
