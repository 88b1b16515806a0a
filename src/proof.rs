//! Proofs delivered by the wallet and the verification boundary.
//!
//! The bridge does not verify proofs itself. It decodes what the wallet sent
//! and hands the bytes to a [`ProofVerifier`] supplied by the caller.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Proof as produced by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Hex-encoded proof bytes, optionally `0x` prefixed
    pub proof: String,
    /// Public inputs the proof commits to
    #[serde(default)]
    pub public_inputs: Vec<String>,
}

impl Proof {
    /// Create from a hex proof and its public inputs
    pub fn new(proof: impl Into<String>, public_inputs: Vec<String>) -> Self {
        Self {
            proof: proof.into(),
            public_inputs,
        }
    }

    /// Decoded proof bytes
    pub fn proof_bytes(&self) -> Result<Vec<u8>> {
        let hex_str = self.proof.strip_prefix("0x").unwrap_or(&self.proof);
        if hex_str.is_empty() {
            return Err(BridgeError::Verification("Proof is empty".to_string()));
        }
        hex::decode(hex_str).map_err(|e| BridgeError::Verification(format!("Invalid proof hex: {e}")))
    }
}

/// Checks a proof against its public inputs
pub trait ProofVerifier: Send + Sync {
    /// Returns whether the proof is valid. Errors mean the check could not run.
    fn verify(&self, proof: &[u8], public_inputs: &[String]) -> Result<bool>;
}

impl<F> ProofVerifier for F
where
    F: Fn(&[u8], &[String]) -> Result<bool> + Send + Sync,
{
    fn verify(&self, proof: &[u8], public_inputs: &[String]) -> Result<bool> {
        self(proof, public_inputs)
    }
}
