//! # Digital Signatures
//!
//! Verification for the two schemes an envelope may declare in
//! `header.alg`:
//!
//! - **ed25519**: 32-byte public keys, 64-byte signatures, strict
//!   verification via `ed25519-dalek`.
//! - **secp256k1**: SEC1 public keys (33 or 65 bytes), 64-byte compact
//!   `r || s` ECDSA signatures via `k256`. The signed message is hashed with
//!   SHA-256 by the scheme itself.
//!
//! The message in both cases is the raw envelope digest, i.e. the bytes
//! behind the hex string in `hash.value`.
//!
//! We never sign here. Tally holds no secret keys; callers bring signatures
//! already computed.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::signature::Verifier as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors during signature verification.
///
/// Callers collapse these into the envelope taxonomy; the distinction is
/// kept only for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// A registered signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
}

impl SignatureScheme {
    /// Wire name, as it appears in `header.alg`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureScheme::Ed25519 => "ed25519",
            SignatureScheme::Secp256k1 => "secp256k1",
        }
    }

    /// Verify `signature` over `message` under `public_key`.
    ///
    /// Any malformed input is an error, never a panic.
    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        match self {
            SignatureScheme::Ed25519 => verify_ed25519(public_key, message, signature),
            SignatureScheme::Secp256k1 => verify_secp256k1(public_key, message, signature),
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when `header.alg` names a scheme we don't implement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown signature scheme: {0}")]
pub struct UnknownScheme(pub String);

impl FromStr for SignatureScheme {
    type Err = UnknownScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519" => Ok(SignatureScheme::Ed25519),
            "secp256k1" => Ok(SignatureScheme::Secp256k1),
            other => Err(UnknownScheme(other.to_string())),
        }
    }
}

fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_slice(signature)
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;

    key.verify_strict(message, &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}

fn verify_secp256k1(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig = k256::ecdsa::Signature::from_slice(signature)
        .map_err(|_| SignatureError::InvalidSignatureBytes)?;

    key.verify(message, &sig)
        .map_err(|_| SignatureError::VerificationFailed)
}
