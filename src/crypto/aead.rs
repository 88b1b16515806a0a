//! ChaCha20-Poly1305 AEAD encryption for relay envelopes.
//!
//! The nonce is prepended to the ciphertext; the auth tag is appended by the
//! cipher. The session topic is passed as associated data so a ciphertext
//! cannot be replayed into another session.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use super::error::CryptoError;
use super::exchange::SharedSecret;
use super::{AEAD_TAG_SIZE, NONCE_SIZE};

/// ChaCha20-Poly1305 cipher bound to one session key
pub struct AeadCipher {
    cipher: ChaCha20Poly1305,
}

impl AeadCipher {
    /// Create a new AEAD cipher with the given key
    pub fn new(key: &SharedSecret) -> Self {
        let key_bytes: [u8; 32] = *key.as_bytes();
        Self {
            cipher: ChaCha20Poly1305::new(&key_bytes.into()),
        }
    }

    /// Encrypt plaintext with the given nonce and associated data
    ///
    /// Returns: nonce || ciphertext || tag
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Encrypt with a fresh random nonce from the system CSPRNG.
    pub fn encrypt_auto_nonce(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.encrypt(plaintext, &nonce, associated_data)
    }

    /// Decrypt ciphertext
    ///
    /// Input format: nonce || ciphertext || tag
    pub fn decrypt(
        &self,
        ciphertext_with_nonce: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext_with_nonce.len() < NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(CryptoError::DataTooShort {
                len: ciphertext_with_nonce.len(),
            });
        }

        let (nonce, ciphertext) = ciphertext_with_nonce.split_at(NONCE_SIZE);
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        self.cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}
