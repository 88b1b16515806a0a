//! The encryption boundary used by the protocol handler.

use hkdf::Hkdf;
use sha2::Sha256;

use super::aead::AeadCipher;
use super::error::CryptoError;
use super::exchange::{KeyPair, PublicKey, SharedSecret};
use super::{KEY_SIZE, SESSION_KEY_INFO};

/// Key agreement and envelope encryption for relay sessions.
///
/// `context` is always the session topic. Implementations must bind it into
/// the ciphertext (associated data) so a payload from one session fails to
/// decrypt in another, and must report authentication failures as
/// [`CryptoError::DecryptionFailed`].
pub trait EncryptionGateway: Send + Sync {
    /// Fresh identity key pair for a new session.
    fn generate_key_pair(&self) -> KeyPair;

    /// Agree on a symmetric key with the wallet.
    fn derive_shared_secret(
        &self,
        private: &KeyPair,
        peer_public: &PublicKey,
    ) -> Result<SharedSecret, CryptoError>;

    /// Encrypt `plaintext` for the session identified by `context`.
    fn encrypt(
        &self,
        plaintext: &[u8],
        secret: &SharedSecret,
        context: &str,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a payload produced by [`EncryptionGateway::encrypt`].
    fn decrypt(
        &self,
        ciphertext: &[u8],
        secret: &SharedSecret,
        context: &str,
    ) -> Result<Vec<u8>, CryptoError>;
}

/// X25519 + HKDF-SHA256 + ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Gateway;

impl X25519Gateway {
    /// Create the default gateway
    pub fn new() -> Self {
        Self
    }
}

impl EncryptionGateway for X25519Gateway {
    fn generate_key_pair(&self) -> KeyPair {
        KeyPair::generate()
    }

    fn derive_shared_secret(
        &self,
        private: &KeyPair,
        peer_public: &PublicKey,
    ) -> Result<SharedSecret, CryptoError> {
        let raw = private.diffie_hellman(peer_public);
        // Low-order peer points yield an all-zero DH output.
        if raw.iter().all(|b| *b == 0) {
            return Err(CryptoError::InvalidPublicKey(
                "Peer key produced a degenerate shared secret".to_string(),
            ));
        }

        let hk = Hkdf::<Sha256>::new(None, &raw);
        let mut okm = [0u8; KEY_SIZE];
        hk.expand(SESSION_KEY_INFO, &mut okm)
            .map_err(|e| CryptoError::Derivation(format!("HKDF expand failed: {}", e)))?;

        Ok(SharedSecret::from_bytes(okm))
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        secret: &SharedSecret,
        context: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        AeadCipher::new(secret).encrypt_auto_nonce(plaintext, context.as_bytes())
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        secret: &SharedSecret,
        context: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        AeadCipher::new(secret).decrypt(ciphertext, context.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn established_pair() -> (SharedSecret, SharedSecret) {
        let gateway = X25519Gateway::new();
        let app = gateway.generate_key_pair();
        let wallet = gateway.generate_key_pair();
        let a = gateway
            .derive_shared_secret(&app, wallet.public_key())
            .unwrap();
        let b = gateway
            .derive_shared_secret(&wallet, app.public_key())
            .unwrap();
        (a, b)
    }

    #[test]
    fn test_both_sides_derive_same_secret() {
        let (a, b) = established_pair();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_low_order_point() {
        let gateway = X25519Gateway::new();
        let kp = gateway.generate_key_pair();
        let zero = PublicKey::from_bytes([0u8; 32]);
        assert!(matches!(
            gateway.derive_shared_secret(&kp, &zero),
            Err(CryptoError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_context_binds_ciphertext() {
        let gateway = X25519Gateway::new();
        let (secret, _) = established_pair();
        let ct = gateway.encrypt(b"accept", &secret, "topic-1").unwrap();

        let err = gateway.decrypt(&ct, &secret, "topic-2").unwrap_err();
        assert!(err.is_authentication_failure());
    }

    proptest! {
        #[test]
        fn prop_encrypt_decrypt_roundtrip(
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            key in any::<[u8; 32]>(),
            context in "[a-z0-9]{1,40}",
        ) {
            let gateway = X25519Gateway::new();
            let secret = SharedSecret::from_bytes(key);
            let ct = gateway.encrypt(&plaintext, &secret, &context).unwrap();
            let pt = gateway.decrypt(&ct, &secret, &context).unwrap();
            prop_assert_eq!(pt, plaintext);
        }
    }
}
