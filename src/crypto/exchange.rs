//! X25519 key material for the relay handshake.
//!
//! Each session owns one [`KeyPair`]. Its public half travels to the wallet
//! inside the request URL; the wallet answers with its own public key in the
//! `handshake` message and both sides arrive at the same [`SharedSecret`].

use std::fmt;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::CryptoError;
use super::KEY_SIZE;

/// X25519 public key (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Create from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey(format!(
                "Expected {} bytes, got {}",
                KEY_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse the hex form used on the wire.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex, as embedded in request URLs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey([{}...])", hex::encode(&self.0[..4]))
    }
}

/// X25519 key pair (private + public)
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_static(StaticSecret::random_from_rng(OsRng))
    }

    /// Create from a secret key (32 bytes)
    pub fn from_secret(secret_bytes: [u8; KEY_SIZE]) -> Self {
        Self::from_static(StaticSecret::from(secret_bytes))
    }

    fn from_static(secret: StaticSecret) -> Self {
        let public = X25519Public::from(&secret);
        Self {
            secret,
            public: PublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw Diffie-Hellman output with the peer's public key.
    ///
    /// Callers should not use this directly as a cipher key; the gateway runs
    /// it through HKDF first.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> [u8; KEY_SIZE] {
        let peer = X25519Public::from(*peer_public.as_bytes());
        self.secret.diffie_hellman(&peer).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Symmetric session key agreed during the handshake.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; KEY_SIZE]);

impl SharedSecret {
    /// Wrap derived key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't leak key material in debug output
        write!(f, "SharedSecret([REDACTED, {} bytes])", KEY_SIZE)
    }
}
