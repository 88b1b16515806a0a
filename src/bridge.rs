//! Client facade.
//!
//! A [`Bridge`] opens credential requests, routes relay traffic to the right
//! session, and hands delivered proofs to the caller's verifier.
//!
//! ```no_run
//! use idbridge::{Bridge, BridgeConfig, RequestOptions};
//!
//! # async fn demo() -> idbridge::Result<()> {
//! let bridge = Bridge::new(BridgeConfig::from_env())?;
//! let descriptor = bridge
//!     .request(RequestOptions::default())?
//!     .gte("age", 18)?
//!     .done()?;
//!
//! descriptor
//!     .subscriptions
//!     .on_proof_generated(|proof| println!("proof: {proof}"))?
//!     .on_reject(|| println!("rejected"))?;
//!
//! println!("scan: {}", descriptor.url);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use url::Url;

use crate::config::{BridgeConfig, ServiceInfo};
use crate::crypto::{EncryptionGateway, KeyPair, X25519Gateway};
use crate::error::{BridgeError, Result};
use crate::proof::{Proof, ProofVerifier};
use crate::protocol::SessionState;
use crate::request::CredentialConfigBuilder;
use crate::session::{SessionRegistry, Topic};
use crate::transport::{InboundSink, Transport, TransportEvent};

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Use this topic instead of a random one
    pub topic: Option<Topic>,
    /// Use this key pair instead of a fresh one
    pub key_pair: Option<KeyPair>,
    /// Describe the service differently for this request
    pub service: Option<ServiceInfo>,
}

impl RequestOptions {
    /// Set topic
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Set key pair
    pub fn with_key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Set service
    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.service = Some(service);
        self
    }
}

/// Identity bridge client
pub struct Bridge {
    config: BridgeConfig,
    request_url: Url,
    registry: Arc<SessionRegistry>,
    verifier: Option<Arc<dyn ProofVerifier>>,
}

impl Bridge {
    /// Create with the default gateway and transport
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a bridge with custom components
    pub fn builder(config: BridgeConfig) -> BridgeBuilder {
        BridgeBuilder {
            config,
            transport: None,
            gateway: None,
            verifier: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Session registry
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Open a new request: create a session, connect it to the relay and
    /// return a builder for its credential constraints.
    pub fn request(&self, options: RequestOptions) -> Result<CredentialConfigBuilder> {
        let service = options.service.unwrap_or_else(|| self.config.service.clone());
        let registry = Arc::downgrade(&self.registry);

        let topic = self.registry.create(options.topic, options.key_pair, service, |topic| {
            let topic = topic.clone();
            let sink: InboundSink = Arc::new(move |event| match registry.upgrade() {
                Some(registry) => registry.deliver(topic.as_str(), event),
                None => tracing::debug!(topic = %topic, "bridge gone, event dropped"),
            });
            sink
        })?;

        tracing::info!(topic = %topic, "request opened");
        Ok(CredentialConfigBuilder::new(
            Arc::clone(&self.registry),
            self.request_url.clone(),
            self.config.domain.clone(),
            topic,
        ))
    }

    /// Cancel a request, closing its connection and dropping its callbacks.
    ///
    /// Returns whether the request was live. Safe to call repeatedly.
    pub fn cancel_request(&self, topic: &str) -> bool {
        let existed = self.registry.destroy(topic);
        if existed {
            tracing::info!(topic, "request cancelled");
        }
        existed
    }

    /// Feed a connection event to a session, as the transport would
    pub fn deliver(&self, topic: &str, event: TransportEvent) {
        self.registry.deliver(topic, event);
    }

    /// Current state of a request
    pub fn state(&self, topic: &str) -> Option<SessionState> {
        self.registry.state(topic)
    }

    /// Whether the wallet has completed the handshake
    pub fn is_handshake_complete(&self, topic: &str) -> bool {
        self.registry.is_handshake_complete(topic).unwrap_or(false)
    }

    /// Topics of all live requests
    pub fn active_topics(&self) -> Vec<Topic> {
        self.registry.topics()
    }

    /// Check a delivered proof with the configured verifier
    pub fn verify(&self, proof: &Proof) -> Result<bool> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| BridgeError::Verification("No proof verifier configured".to_string()))?;
        let bytes = proof.proof_bytes()?;
        let valid = verifier.verify(&bytes, &proof.public_inputs)?;
        tracing::debug!(
            valid,
            proof_len = bytes.len(),
            inputs = proof.public_inputs.len(),
            "proof verified"
        );
        Ok(valid)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

/// Builder for [`Bridge`]
pub struct BridgeBuilder {
    config: BridgeConfig,
    transport: Option<Arc<dyn Transport>>,
    gateway: Option<Arc<dyn EncryptionGateway>>,
    verifier: Option<Arc<dyn ProofVerifier>>,
}

impl BridgeBuilder {
    /// Use a custom transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom encryption gateway
    pub fn with_gateway(mut self, gateway: Arc<dyn EncryptionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the proof verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Validate the configuration and build
    pub fn build(self) -> Result<Bridge> {
        self.config.validate()?;
        let request_url = self.config.request_url()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config)?,
        };
        let gateway = self
            .gateway
            .unwrap_or_else(|| Arc::new(X25519Gateway::new()));

        tracing::debug!(
            transport = transport.name(),
            domain = %self.config.domain,
            "bridge ready"
        );

        Ok(Bridge {
            registry: Arc::new(SessionRegistry::new(gateway, transport)),
            request_url,
            config: self.config,
            verifier: self.verifier,
        })
    }
}

#[cfg(feature = "websocket")]
fn default_transport(config: &BridgeConfig) -> Result<Arc<dyn Transport>> {
    let transport = crate::transport::WebSocketTransport::new(&config.relay_url)?
        .with_connect_timeout(config.connect_timeout());
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "websocket"))]
fn default_transport(_config: &BridgeConfig) -> Result<Arc<dyn Transport>> {
    Err(BridgeError::Config(
        "No transport configured and the `websocket` feature is disabled".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::transport::ChannelTransport;

    fn bridge() -> (Bridge, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::new());
        let bridge = Bridge::builder(BridgeConfig::default())
            .with_transport(transport.clone())
            .build()
            .unwrap();
        (bridge, transport)
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = BridgeConfig::default().with_domain("");
        let result = Bridge::builder(config)
            .with_transport(Arc::new(ChannelTransport::new()))
            .build();
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_request_and_cancel() {
        let (bridge, transport) = bridge();
        let builder = bridge.request(RequestOptions::default()).unwrap();
        let topic = builder.topic().clone();

        assert_eq!(bridge.active_topics(), vec![topic.clone()]);
        assert_eq!(bridge.state(topic.as_str()), Some(SessionState::Created));
        assert!(!bridge.is_handshake_complete(topic.as_str()));
        assert_eq!(transport.opened(), 1);

        assert!(bridge.cancel_request(topic.as_str()));
        assert!(!bridge.cancel_request(topic.as_str()));
        assert!(bridge.active_topics().is_empty());
        assert_eq!(bridge.state(topic.as_str()), None);
    }

    #[test]
    fn test_duplicate_topic() {
        let (bridge, _transport) = bridge();
        let options = RequestOptions::default().with_topic(Topic::new("abc456").unwrap());
        bridge.request(options.clone()).unwrap();
        assert!(matches!(
            bridge.request(options),
            Err(BridgeError::Configuration(ConfigError::DuplicateTopic(_)))
        ));
    }

    #[test]
    fn test_connected_event_through_sink() {
        let (bridge, transport) = bridge();
        let builder = bridge.request(RequestOptions::default()).unwrap();
        let peer = transport.take_peer(builder.topic().as_str()).unwrap();

        peer.connect();
        assert_eq!(
            bridge.state(builder.topic().as_str()),
            Some(SessionState::AwaitingHandshake)
        );
    }

    #[test]
    fn test_verify() {
        let (bridge, _transport) = bridge();
        let proof = Proof::new("deadbeef", vec!["1".to_string()]);
        assert!(matches!(
            bridge.verify(&proof),
            Err(BridgeError::Verification(_))
        ));

        let verifier = |bytes: &[u8], inputs: &[String]| -> Result<bool> {
            Ok(bytes == [0xde, 0xad, 0xbe, 0xef] && inputs == ["1"])
        };
        let bridge = Bridge::builder(BridgeConfig::default())
            .with_transport(Arc::new(ChannelTransport::new()))
            .with_verifier(Arc::new(verifier))
            .build()
            .unwrap();
        assert!(bridge.verify(&proof).unwrap());
        assert!(!bridge.verify(&Proof::new("00", vec![])).unwrap());
        assert!(bridge.verify(&Proof::new("zz", vec![])).is_err());
    }

    #[cfg(feature = "websocket")]
    #[tokio::test]
    async fn test_default_transport_is_websocket() {
        let bridge = Bridge::new(BridgeConfig::default().with_relay_url("ws://127.0.0.1:9")).unwrap();
        let builder = bridge.request(RequestOptions::default()).unwrap();
        assert!(bridge.cancel_request(builder.topic().as_str()));
    }
}
