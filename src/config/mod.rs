//! Client configuration.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - `with_*` builder methods
//!
//! ```toml
//! relay_url = "wss://relay.idbridge.io"
//! request_base_url = "https://request.idbridge.io"
//! domain = "relay.idbridge.io"
//!
//! [service]
//! name = "Acme Rentals"
//! purpose = "Age verification"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BridgeError, Result};

/// Default public relay
pub const DEFAULT_RELAY_URL: &str = "wss://relay.idbridge.io";
/// Default landing page the request URL points at
pub const DEFAULT_REQUEST_BASE_URL: &str = "https://request.idbridge.io";
/// Default relay domain advertised to wallets
pub const DEFAULT_DOMAIN: &str = "relay.idbridge.io";

/// Bridge client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket relay endpoint (`ws://` or `wss://`)
    pub relay_url: String,

    /// Base of the shareable request URL
    pub request_base_url: String,

    /// Relay domain the wallet connects to
    pub domain: String,

    /// Relay connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Requesting service, shown by the wallet
    pub service: ServiceInfo,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            request_base_url: DEFAULT_REQUEST_BASE_URL.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            connect_timeout_secs: 10,
            service: ServiceInfo::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let content = std::fs::read_to_string(path.into())?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(relay_url) = std::env::var("IDBRIDGE_RELAY_URL") {
            config.relay_url = relay_url;
        }
        if let Ok(request_url) = std::env::var("IDBRIDGE_REQUEST_URL") {
            config.request_base_url = request_url;
        }
        if let Ok(domain) = std::env::var("IDBRIDGE_DOMAIN") {
            config.domain = domain;
        }
        if let Ok(val) = std::env::var("IDBRIDGE_CONNECT_TIMEOUT_SECS") {
            if let Ok(val) = val.parse() {
                config.connect_timeout_secs = val;
            }
        }
        if let Ok(name) = std::env::var("IDBRIDGE_SERVICE_NAME") {
            config.service.name = name;
        }

        config
    }

    /// Set relay endpoint
    pub fn with_relay_url(mut self, relay_url: impl Into<String>) -> Self {
        self.relay_url = relay_url.into();
        self
    }

    /// Set request URL base
    pub fn with_request_base_url(mut self, url: impl Into<String>) -> Self {
        self.request_base_url = url.into();
        self
    }

    /// Set relay domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set requesting service
    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.service = service;
        self
    }

    /// Set connect timeout, rounded up to whole seconds
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Parsed request URL base
    pub fn request_url(&self) -> Result<Url> {
        let url = Url::parse(&self.request_base_url)
            .map_err(|e| BridgeError::Config(format!("Invalid request URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BridgeError::Config(format!(
                "Request URL must use http:// or https://, got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Check the configuration before any session is created
    pub fn validate(&self) -> Result<()> {
        let relay = Url::parse(&self.relay_url)
            .map_err(|e| BridgeError::Config(format!("Invalid relay URL: {e}")))?;
        if !matches!(relay.scheme(), "ws" | "wss") {
            return Err(BridgeError::Config(format!(
                "Relay URL must use ws:// or wss://, got {}",
                relay.scheme()
            )));
        }

        self.request_url()?;

        if self.domain.trim().is_empty() {
            return Err(BridgeError::Config("Domain must not be empty".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "Connect timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}

/// Description of the requesting service.
///
/// Encoded into the request URL so the wallet can tell the user who is
/// asking and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    /// Display name
    pub name: String,

    /// Logo URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    /// Why the credentials are needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl ServiceInfo {
    /// Create with a display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set logo URL
    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    /// Set purpose
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}
