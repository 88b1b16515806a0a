//! Unified cryptographic error type for relay sessions.
//!
//! Every failure from the [`EncryptionGateway`](super::EncryptionGateway)
//! surfaces as a [`CryptoError`]. The variants keep authentication failures
//! apart from malformed input so the protocol handler can log them by class.
//!
//! | Error | Meaning |
//! |-------|---------|
//! | `InvalidPublicKey` | Peer key was not 32 bytes of hex |
//! | `DataTooShort` | Ciphertext shorter than nonce + tag |
//! | `DecryptionFailed` | Tag mismatch: tampered payload or wrong topic |
//! | `EncryptionFailed` | Cipher refused the plaintext |
//! | `Derivation` | HKDF expansion failed |
//! | `MissingSharedSecret` | Encrypted traffic before the handshake |

use thiserror::Error;

/// Errors from key exchange and envelope encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Peer public key could not be parsed.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Ciphertext is shorter than nonce plus authentication tag.
    #[error("Ciphertext too short: {len} bytes")]
    DataTooShort {
        /// Length of the rejected ciphertext.
        len: usize,
    },

    /// Authentication tag did not verify.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Cipher failed to encrypt.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Session key derivation failed.
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    /// No shared secret has been established for the session yet.
    #[error("No shared secret established")]
    MissingSharedSecret,
}

impl CryptoError {
    /// True when the failure means the ciphertext did not authenticate.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::DecryptionFailed(_) | CryptoError::DataTooShort { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failure_classes() {
        assert!(CryptoError::DecryptionFailed("tag".into()).is_authentication_failure());
        assert!(CryptoError::DataTooShort { len: 3 }.is_authentication_failure());
        assert!(!CryptoError::MissingSharedSecret.is_authentication_failure());
        assert!(!CryptoError::InvalidPublicKey("short".into()).is_authentication_failure());
    }

    #[test]
    fn test_error_display() {
        let err = CryptoError::DataTooShort { len: 10 };
        assert_eq!(err.to_string(), "Ciphertext too short: 10 bytes");
    }
}
