//! # Hashing Utilities
//!
//! Digest functions used throughout Tally. Envelopes name their digest in
//! `hash.type`, so the algorithm is a value ([`DigestAlgorithm`]) rather than
//! a hard-coded call:
//!
//! - **SHA-256**: the default. Seals every ledger record and feeds address
//!   derivation.
//! - **SHA-512**: available for deployments that widen the allow-list.
//! - **RIPEMD-160**: only ever applied on top of a digest, to shorten public
//!   keys into 20-byte address payloads.

use std::fmt;
use std::str::FromStr;

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// A digest algorithm an envelope may declare in `hash.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Wire name, as it appears in `hash.type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => sha256(data),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Hash `data` and render the digest as lowercase hex.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when `hash.type` names an algorithm we don't implement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown digest algorithm: {0}")]
pub struct UnknownDigest(pub String);

impl FromStr for DigestAlgorithm {
    type Err = UnknownDigest;

    /// Case-sensitive, like every other comparison on envelope fields.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            other => Err(UnknownDigest(other.to_string())),
        }
    }
}

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use tally_protocol::crypto::sha256;
///
/// let hash = sha256(b"tally");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute RIPEMD-160. Always 20 bytes.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// `RIPEMD160(algorithm(data))`: the key hash embedded in addresses.
pub fn key_hash(algorithm: DigestAlgorithm, data: &[u8]) -> [u8; 20] {
    ripemd160(&algorithm.digest(data))
}
