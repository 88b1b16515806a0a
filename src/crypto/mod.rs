//! Cryptographic security for relay sessions.
//!
//! The relay sees every frame, so everything after the handshake travels
//! inside an authenticated envelope:
//!
//! ```text
//! Web app: (sk_a, pk_a) = X25519::generate()      pk_a goes into the request URL
//! Wallet:  (sk_b, pk_b) = X25519::generate()      pk_b arrives in `handshake`
//!
//! shared  = X25519(sk_a, pk_b) = X25519(sk_b, pk_a)
//! key     = HKDF-SHA256(shared, "idbridge/session/v1")
//! payload = nonce(12) || ChaCha20-Poly1305(key, plaintext, aad = topic)
//! ```
//!
//! The protocol handler only talks to the [`EncryptionGateway`] trait;
//! [`X25519Gateway`] is the implementation used by default.
//!
//! # Nonces
//!
//! Nonces are 96 random bits per message. A session exchanges a handful of
//! messages, far below the birthday bound.

mod aead;
mod error;
mod exchange;
mod gateway;

pub use aead::AeadCipher;
pub use error::CryptoError;
pub use exchange::{KeyPair, PublicKey, SharedSecret};
pub use gateway::{EncryptionGateway, X25519Gateway};

/// Nonce size for ChaCha20-Poly1305 (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for ChaCha20-Poly1305 (128 bits)
pub const AEAD_TAG_SIZE: usize = 16;

/// X25519 and session key size (256 bits)
pub const KEY_SIZE: usize = 32;

/// HKDF info string for session keys
pub const SESSION_KEY_INFO: &[u8] = b"idbridge/session/v1";
