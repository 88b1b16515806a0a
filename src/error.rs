//! Error types for the identity bridge.
//!
//! # Handling classes
//!
//! | Class | Variant | Policy |
//! |-------|---------|--------|
//! | Protocol | `Protocol`, `Json` | logged, message ignored |
//! | Crypto | `Crypto` | logged, message ignored, state unchanged |
//! | Unknown topic | `SessionNotFound` | dropped, debug trace only |
//! | Transport | `Transport` | surfaced through `on_error` when registered |
//! | Misuse | `Configuration` | returned to the caller synchronously |
//! | Loading | `Config`, `Io` | returned from `BridgeConfig::from_file` |
//!
//! Nothing here is fatal to the process. The `Crypto` variant preserves the
//! underlying error via `#[source]`.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Caller misuse of the request builder or session registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Credential name is not one the wallet understands.
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    /// Predicate kind does not apply to the credential's value type.
    #[error("Predicate `{predicate}` is not supported on {kind} credential `{credential}`")]
    UnsupportedPredicate {
        /// Predicate that was requested.
        predicate: &'static str,
        /// Credential it was requested on.
        credential: String,
        /// Value type of the credential.
        kind: &'static str,
    },

    /// Value type does not match the credential's value type.
    #[error("Credential `{credential}` expects a {expected} value, got {found}")]
    ValueKindMismatch {
        /// Credential being constrained.
        credential: String,
        /// Value type the credential holds.
        expected: &'static str,
        /// Value type that was supplied.
        found: &'static str,
    },

    /// `range` called with `start > end`.
    #[error("Inverted range on `{credential}`: start {start} is after end {end}")]
    InvertedRange {
        /// Credential being constrained.
        credential: String,
        /// Supplied lower bound.
        start: String,
        /// Supplied upper bound.
        end: String,
    },

    /// `in`/`out` called with no values.
    #[error("Empty value list for `{predicate}` on `{credential}`")]
    EmptyList {
        /// `in` or `out`.
        predicate: &'static str,
        /// Credential being constrained.
        credential: String,
    },

    /// Caller-supplied topic collides with a live session.
    #[error("Topic already in use: {0}")]
    DuplicateTopic(String),

    /// Caller-supplied topic is empty.
    #[error("Topic must not be empty")]
    EmptyTopic,
}

/// Identity bridge errors.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Malformed envelope or message not valid in the current state.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Key exchange or envelope encryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[source] CryptoError),

    /// No live session for the topic.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Relay connection failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid builder or registry usage.
    #[error("Configuration error: {0}")]
    Configuration(#[source] ConfigError),

    /// Client configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),

    /// Proof could not be handed to the verifier.
    #[error("Verification error: {0}")]
    Verification(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<CryptoError> for BridgeError {
    fn from(err: CryptoError) -> Self {
        BridgeError::Crypto(err)
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::Configuration(err)
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(format!("Failed to parse config: {err}"))
    }
}

impl From<base64::DecodeError> for BridgeError {
    fn from(err: base64::DecodeError) -> Self {
        BridgeError::Protocol(format!("Base64 decode error: {err}"))
    }
}
