//! Fluent request builder and the descriptor it produces.

use std::sync::{Arc, Weak};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use url::Url;

use super::config::{Predicate, RequestConfig};
use super::credential::{Credential, CredentialValue};
use crate::error::{BridgeError, Result};
use crate::events::{Callback, Event, EventKind};
use crate::session::{SessionRegistry, Topic};

/// Query parameter carrying the relay domain
pub const PARAM_DOMAIN: &str = "d";
/// Query parameter carrying the topic
pub const PARAM_TOPIC: &str = "t";
/// Query parameter carrying the base64 credential configuration
pub const PARAM_CONFIG: &str = "c";
/// Query parameter carrying the base64 service description
pub const PARAM_SERVICE: &str = "s";
/// Query parameter carrying the session public key (hex)
pub const PARAM_PUBKEY: &str = "p";

/// Accumulates credential constraints for one session.
///
/// Every operation writes straight into the session's configuration, so a
/// builder is only a handle: the session itself is the source of truth.
/// Once the session is cancelled every operation fails with
/// [`BridgeError::SessionNotFound`].
///
/// ```no_run
/// # fn demo(builder: &mut idbridge::CredentialConfigBuilder) -> idbridge::Result<()> {
/// let descriptor = builder
///     .range("age", 18, 25)?
///     .out("nationality", ["PRK"])?
///     .check_aml(None)?
///     .done()?;
/// println!("{}", descriptor.url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialConfigBuilder {
    registry: Arc<SessionRegistry>,
    request_base_url: Url,
    domain: String,
    topic: Topic,
}

impl CredentialConfigBuilder {
    pub(crate) fn new(
        registry: Arc<SessionRegistry>,
        request_base_url: Url,
        domain: String,
        topic: Topic,
    ) -> Self {
        Self {
            registry,
            request_base_url,
            domain,
            topic,
        }
    }

    /// Topic of the session being configured
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Require the credential to equal `value`
    pub fn eq(&mut self, key: impl AsRef<str>, value: impl Into<CredentialValue>) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Eq(value.into()))
    }

    /// Require the credential to be at least `value`
    pub fn gte(&mut self, key: impl AsRef<str>, value: impl Into<CredentialValue>) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Gte(value.into()))
    }

    /// Require the credential to be above `value`
    pub fn gt(&mut self, key: impl AsRef<str>, value: impl Into<CredentialValue>) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Gt(value.into()))
    }

    /// Require the credential to be at most `value`
    pub fn lte(&mut self, key: impl AsRef<str>, value: impl Into<CredentialValue>) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Lte(value.into()))
    }

    /// Require the credential to be below `value`
    pub fn lt(&mut self, key: impl AsRef<str>, value: impl Into<CredentialValue>) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Lt(value.into()))
    }

    /// Require the credential to lie in `[start, end]`.
    ///
    /// `start > end` is rejected, never reordered.
    pub fn range(
        &mut self,
        key: impl AsRef<str>,
        start: impl Into<CredentialValue>,
        end: impl Into<CredentialValue>,
    ) -> Result<&mut Self> {
        self.apply(key.as_ref(), Predicate::Range(start.into(), end.into()))
    }

    /// Require the credential to be one of `values`
    pub fn in_<I, V>(&mut self, key: impl AsRef<str>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<CredentialValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.apply(key.as_ref(), Predicate::In(values))
    }

    /// Require the credential to be none of `values`
    pub fn out<I, V>(&mut self, key: impl AsRef<str>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<CredentialValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.apply(key.as_ref(), Predicate::Out(values))
    }

    /// Request an anti-money-laundering check, optionally scoped to a country
    pub fn check_aml(&mut self, country_scope: Option<&str>) -> Result<&mut Self> {
        let scope = country_scope.map(str::to_owned);
        self.registry
            .with_session(self.topic.as_str(), |s| s.config_mut().set_aml(scope))
            .ok_or_else(|| self.not_found())?;
        Ok(self)
    }

    fn apply(&mut self, key: &str, predicate: Predicate) -> Result<&mut Self> {
        let credential: Credential = key.parse()?;
        self.registry
            .with_session(self.topic.as_str(), |s| {
                s.config_mut().apply(credential, predicate)
            })
            .ok_or_else(|| self.not_found())??;
        Ok(self)
    }

    /// Snapshot the configuration and assemble the shareable request.
    ///
    /// Calling this again over an unchanged configuration yields the same
    /// URL. Later builder calls do not affect descriptors already returned.
    pub fn done(&self) -> Result<RequestDescriptor> {
        let snapshot = self
            .registry
            .with_session(self.topic.as_str(), |s| {
                (s.config().clone(), s.service().clone(), *s.public_key())
            })
            .ok_or_else(|| self.not_found())?;
        let (config, service, public_key) = snapshot;

        let service_json = serde_json::to_string(&service)?;

        let mut url = self.request_base_url.clone();
        url.query_pairs_mut()
            .append_pair(PARAM_DOMAIN, &self.domain)
            .append_pair(PARAM_TOPIC, self.topic.as_str())
            .append_pair(PARAM_CONFIG, &config.to_base64()?)
            .append_pair(PARAM_SERVICE, &URL_SAFE.encode(service_json))
            .append_pair(PARAM_PUBKEY, &public_key.to_hex());

        tracing::debug!(
            topic = %self.topic,
            credentials = config.len(),
            aml = config.aml().is_some(),
            "request finalized"
        );

        Ok(RequestDescriptor {
            url,
            topic: self.topic.clone(),
            config,
            subscriptions: Subscriptions {
                registry: Arc::downgrade(&self.registry),
                topic: self.topic.clone(),
            },
        })
    }

    fn not_found(&self) -> BridgeError {
        BridgeError::SessionNotFound(self.topic.to_string())
    }
}

/// Finalized, shareable request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// URL to hand to the wallet, usually as a QR code
    pub url: Url,
    /// Session topic
    pub topic: Topic,
    /// Configuration snapshot encoded in `url`
    pub config: RequestConfig,
    /// Lifecycle callback registration
    pub subscriptions: Subscriptions,
}

impl RequestDescriptor {
    /// Recover the configuration JSON carried in a request URL
    pub fn decode_config(url: &str) -> Result<serde_json::Value> {
        let url = Url::parse(url).map_err(|e| BridgeError::Protocol(format!("Invalid request URL: {e}")))?;
        let encoded = url
            .query_pairs()
            .find(|(name, _)| name == PARAM_CONFIG)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| BridgeError::Protocol("Request URL has no configuration".to_string()))?;
        let json = URL_SAFE.decode(encoded)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// Callback registration bound to one session.
///
/// Holds only a weak reference to the registry; once the session is gone
/// every registration fails with [`BridgeError::SessionNotFound`].
#[derive(Clone)]
pub struct Subscriptions {
    registry: Weak<SessionRegistry>,
    topic: Topic,
}

impl Subscriptions {
    /// Wallet scanned the request and completed the handshake
    pub fn on_qr_code_scanned<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventKind::QrCodeScanned, Arc::new(move |_: &Event| callback()))
    }

    /// Wallet accepted and started generating the proof; receives the topic
    pub fn on_generating_proof<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(
            EventKind::GeneratingProof,
            Arc::new(move |event: &Event| {
                if let Event::GeneratingProof { topic } = event {
                    callback(topic);
                }
            }),
        )
    }

    /// Wallet delivered a proof; receives the hex proof
    pub fn on_proof_generated<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(
            EventKind::ProofGenerated,
            Arc::new(move |event: &Event| {
                if let Event::ProofGenerated { proof } = event {
                    callback(proof);
                }
            }),
        )
    }

    /// User declined the request
    pub fn on_reject<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventKind::Reject, Arc::new(move |_: &Event| callback()))
    }

    /// Wallet or relay connection reported an error
    pub fn on_error<F>(&self, callback: F) -> Result<&Self>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(
            EventKind::Error,
            Arc::new(move |event: &Event| {
                if let Event::Error { message } = event {
                    callback(message);
                }
            }),
        )
    }

    fn register(&self, kind: EventKind, callback: Callback) -> Result<&Self> {
        self.registry
            .upgrade()
            .and_then(|registry| {
                registry.with_session(self.topic.as_str(), |s| {
                    s.dispatcher_mut().register(kind, callback);
                })
            })
            .ok_or_else(|| BridgeError::SessionNotFound(self.topic.to_string()))?;
        Ok(self)
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
