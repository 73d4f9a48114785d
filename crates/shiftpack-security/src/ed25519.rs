use std::fmt;

use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Ed25519 public key trusted to sign registry payloads.
#[derive(Clone)]
pub struct TrustedKey {
    key: VerifyingKey,
    key_id: String,
}

impl TrustedKey {
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let trimmed = public_key_hex.trim();
        let bytes = hex::decode(trimmed).context("failed to decode Ed25519 public key hex")?;
        let len = bytes.len();
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            anyhow!("invalid Ed25519 public key length: expected 32 bytes, got {len}")
        })?;
        let key = VerifyingKey::from_bytes(&array).context("invalid Ed25519 public key bytes")?;

        Ok(Self {
            key,
            key_id: trimmed.chars().take(16).collect(),
        })
    }

    /// Short identifier used in diagnostics.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Checks a hex-encoded detached signature over `payload`. Malformed
    /// signatures are errors; well-formed ones that do not match return
    /// `Ok(false)`.
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> Result<bool> {
        let bytes = hex::decode(signature_hex.trim())
            .with_context(|| format!("failed to decode signature hex for key {}", self.key_id))?;
        let len = bytes.len();
        let array: [u8; 64] = bytes.try_into().map_err(|_| {
            anyhow!("invalid Ed25519 signature length: expected 64 bytes, got {len}")
        })?;
        let signature = Signature::from_bytes(&array);

        Ok(self.key.verify(payload, &signature).is_ok())
    }
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKey")
            .field("key_id", &self.key_id)
            .finish()
    }
}
