//! JSON-RPC envelopes exchanged through the relay.
//!
//! Two layers share the same envelope shape:
//!
//! - **Relay frames** travel in the clear: `handshake` and `encryptedMessage`.
//! - **Inner messages** travel base64-encoded and encrypted inside an
//!   `encryptedMessage` payload: `hello`, `accept`, `reject`, `done`, `error`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BridgeError, Result};

/// JSON-RPC protocol version tag
pub const JSONRPC_VERSION: &str = "2.0";

/// Relay frame: wallet public key
pub const METHOD_HANDSHAKE: &str = "handshake";
/// Relay frame: encrypted inner message
pub const METHOD_ENCRYPTED: &str = "encryptedMessage";
/// Inner: sent by the web app once the handshake completes
pub const METHOD_HELLO: &str = "hello";
/// Inner: user accepted the request
pub const METHOD_ACCEPT: &str = "accept";
/// Inner: user declined the request
pub const METHOD_REJECT: &str = "reject";
/// Inner: proof delivered
pub const METHOD_DONE: &str = "done";
/// Inner: wallet-side failure
pub const METHOD_ERROR: &str = "error";

/// JSON-RPC message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcMessage {
    /// Protocol version, always "2.0"
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Request id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Value,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl RpcMessage {
    /// Create a request with a fresh id
    pub fn request(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            method: method.to_string(),
            params,
        }
    }

    /// Create a `handshake` relay frame
    pub fn handshake(pubkey_hex: &str) -> Self {
        Self::request(METHOD_HANDSHAKE, json!({ "pubkey": pubkey_hex }))
    }

    /// Create an `encryptedMessage` relay frame
    pub fn encrypted(payload_b64: &str) -> Self {
        Self::request(METHOD_ENCRYPTED, json!({ "payload": payload_b64 }))
    }

    /// Create the inner `hello` message
    pub fn hello() -> Self {
        Self::request(METHOD_HELLO, Value::Null)
    }

    /// Create the inner `accept` message
    pub fn accept() -> Self {
        Self::request(METHOD_ACCEPT, Value::Null)
    }

    /// Create the inner `reject` message
    pub fn reject() -> Self {
        Self::request(METHOD_REJECT, Value::Null)
    }

    /// Create the inner `done` message
    pub fn done(proof_hex: &str) -> Self {
        Self::request(METHOD_DONE, json!({ "proof": proof_hex }))
    }

    /// Create the inner `error` message
    pub fn error(message: &str) -> Self {
        Self::request(METHOD_ERROR, json!({ "error": message }))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from decrypted bytes
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    fn string_param(&self, name: &str) -> Result<String> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                BridgeError::Protocol(format!("`{}` missing string param `{}`", self.method, name))
            })
    }
}

/// Relay frame, typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Wallet public key (hex)
    Handshake {
        /// Hex-encoded X25519 public key
        pubkey: String,
    },
    /// Encrypted inner message (base64)
    Encrypted {
        /// Base64 ciphertext
        payload: String,
    },
}

impl RelayMessage {
    /// Interpret an envelope as a relay frame
    pub fn parse(message: &RpcMessage) -> Result<Self> {
        match message.method.as_str() {
            METHOD_HANDSHAKE => Ok(Self::Handshake {
                pubkey: message.string_param("pubkey")?,
            }),
            METHOD_ENCRYPTED => Ok(Self::Encrypted {
                payload: message.string_param("payload")?,
            }),
            other => Err(BridgeError::Protocol(format!("Unexpected relay method: {other}"))),
        }
    }
}

/// Decrypted inner message, typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerMessage {
    /// User accepted
    Accept,
    /// User declined
    Reject,
    /// Proof delivered (hex)
    Done {
        /// Hex-encoded proof
        proof: String,
    },
    /// Wallet-side failure
    Error {
        /// Error description
        error: String,
    },
    /// Method this version does not understand
    Unknown(String),
}

impl InnerMessage {
    /// Interpret a decrypted envelope
    pub fn parse(message: &RpcMessage) -> Result<Self> {
        match message.method.as_str() {
            METHOD_ACCEPT => Ok(Self::Accept),
            METHOD_REJECT => Ok(Self::Reject),
            METHOD_DONE => Ok(Self::Done {
                proof: message.string_param("proof")?,
            }),
            METHOD_ERROR => Ok(Self::Error {
                error: message.string_param("error")?,
            }),
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}
