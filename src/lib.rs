//! # idbridge - Identity Verification Bridge
//!
//! Client side of a privacy-preserving identity verification flow. An
//! application asks a user's mobile wallet to prove facts about an identity
//! document ("over 18", "not a national of X") without seeing the document.
//!
//! ## Features
//!
//! - **Fluent requests**: chainable credential predicates validated per value type
//! - **Shareable descriptor**: one URL (usually a QR code) carries everything the wallet needs
//! - **End-to-end encryption**: X25519 + HKDF-SHA256 + ChaCha20-Poly1305, topic-bound
//! - **Per-request callbacks**: scanned, generating, proof delivered, rejected, error
//! - **Pluggable transport**: WebSocket relay by default, in-process channels for tests
//!
//! ## Flow
//!
//! ```text
//! Application                      Relay                          Wallet
//!    |                               |                               |
//!    |== request URL (QR) ===================================>      |
//!    |                               |<----- handshake {pubkey} -----|
//!    |<---- handshake {pubkey} ------|                               |
//!    |------ enc(hello) ------------>|------ enc(hello) ------------>|
//!    |<----- enc(accept) ------------|<----- enc(accept) ------------|
//!    |<----- enc(done {proof}) ------|<----- enc(done {proof}) ------|
//! ```
//!
//! The relay only forwards frames by topic; it never sees plaintext.
//!
//! Session states and transitions are documented in [`protocol`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use idbridge::{Bridge, BridgeConfig, RequestOptions, ServiceInfo};
//!
//! let config = BridgeConfig::default().with_service(ServiceInfo::new("Acme Rentals"));
//! let bridge = Bridge::new(config)?;
//!
//! let descriptor = bridge
//!     .request(RequestOptions::default())?
//!     .range("age", 18, 99)?
//!     .out("nationality", ["PRK"])?
//!     .check_aml(None)?
//!     .done()?;
//!
//! descriptor
//!     .subscriptions
//!     .on_qr_code_scanned(|| println!("scanned"))?
//!     .on_proof_generated(|proof| println!("proof {proof}"))?
//!     .on_error(|e| eprintln!("error: {e}"))?;
//!
//! show_qr(descriptor.url.as_str());
//! ```
//!
//! ## Modules
//!
//! - [`bridge`]: Client facade
//! - [`request`]: Credential predicates, builder and request descriptor
//! - [`session`]: Per-request state and the session registry
//! - [`protocol`]: Wire messages, state machine and handler
//! - [`crypto`]: Key exchange and envelope encryption
//! - [`events`]: Lifecycle callbacks
//! - [`transport`]: Relay connections
//! - [`proof`]: Proof values and the verifier boundary
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod bridge;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod proof;
pub mod protocol;
pub mod request;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use bridge::{Bridge, BridgeBuilder, RequestOptions};
pub use config::{BridgeConfig, ServiceInfo};
pub use crypto::{EncryptionGateway, KeyPair, PublicKey, SharedSecret, X25519Gateway};
pub use error::{BridgeError, ConfigError, Result};
pub use events::{Event, EventKind};
pub use proof::{Proof, ProofVerifier};
pub use protocol::{RpcMessage, SessionState};
pub use request::{
    Credential, CredentialConfigBuilder, CredentialValue, RequestConfig, RequestDescriptor,
    Subscriptions,
};
pub use session::Topic;
pub use transport::{ChannelPeer, ChannelTransport, Transport, TransportEvent, TransportHandle};
#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
