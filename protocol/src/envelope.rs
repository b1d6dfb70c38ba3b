//! # Signed Envelopes
//!
//! Every request that enters the ledger, and every record the ledger writes,
//! travels as an envelope:
//!
//! ```json
//! {
//!   "hash":       { "type": "sha256", "value": "<hex digest of payload>" },
//!   "payload":    { ... },
//!   "signatures": [ { "header": { "alg": "ed25519", "kid": "w..." },
//!                     "signature": "<hex>" } ]
//! }
//! ```
//!
//! ## Canonical form
//!
//! `hash.value` is the digest of [`canonical_json`] of the payload: compact,
//! object keys sorted at every depth. Two payloads that differ only in key
//! order hash identically; anything else changes the digest.
//!
//! ## Signatures
//!
//! Signers sign the raw digest bytes, not the payload. A signature entry that
//! doesn't even parse is kept as [`SignatureSlot::Malformed`] so it can be
//! counted as invalid instead of silently vanishing during deserialization.
//!
//! Nothing in this module touches storage. Everything is a pure function of
//! the envelope, a key set and the [`LedgerConfig`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LedgerConfig;
use crate::crypto::hash::DigestAlgorithm;
use crate::crypto::signatures::SignatureScheme;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Why an envelope was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// `hash.type` is unknown or not on the allow-list.
    #[error("invalid hash type: {0}")]
    InvalidHashType(String),

    /// `hash.value` doesn't match the digest of the canonical payload.
    #[error("hash value does not match payload")]
    InvalidHashValue,

    /// `header.alg` names no registered scheme.
    #[error("invalid signature algorithm: {0}")]
    InvalidSignatureAlgorithm(String),

    /// No public key resolves for the signer.
    #[error("missing public key for signer {0}")]
    MissingPublicKey(String),

    /// The signature did not verify (or its bytes were garbage).
    #[error("invalid signature from signer {0}")]
    InvalidSignature(String),

    /// The signature entry at this position is absent or not an object.
    #[error("invalid signature object at position {0}")]
    MissingSignature(usize),

    /// Fewer valid signatures than the threshold demands.
    #[error("{valid} valid signatures, threshold is {threshold}")]
    ThresholdNotMet {
        valid: usize,
        threshold: usize,
        failures: Vec<EnvelopeError>,
    },
}

impl EnvelopeError {
    /// Machine-readable error name.
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeError::InvalidHashType(_) => "invalid-hash-type",
            EnvelopeError::InvalidHashValue => "invalid-hash-value",
            EnvelopeError::InvalidSignatureAlgorithm(_) => "invalid-signature-algorithm",
            EnvelopeError::MissingPublicKey(_) => "missing-public-key",
            EnvelopeError::InvalidSignature(_) => "invalid-signature",
            EnvelopeError::MissingSignature(_) => "invalid-signature-object",
            EnvelopeError::ThresholdNotMet { .. } => "signature-verification-failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// `hash` block of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashHeader {
    /// Digest algorithm name, e.g. `"sha256"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Lowercase hex digest of the canonical payload.
    pub value: String,
}

/// Protected header of one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// A well-formed signature entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub header: SignatureHeader,
    /// Hex-encoded signature bytes.
    pub signature: String,
}

/// One element of `signatures`, parsed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureSlot {
    Entry(SignatureEntry),
    Malformed(Value),
}

impl SignatureSlot {
    pub fn entry(&self) -> Option<&SignatureEntry> {
        match self {
            SignatureSlot::Entry(entry) => Some(entry),
            SignatureSlot::Malformed(_) => None,
        }
    }

    pub fn kid(&self) -> Option<&str> {
        self.entry().and_then(|e| e.header.kid.as_deref())
    }
}

impl From<SignatureEntry> for SignatureSlot {
    fn from(entry: SignatureEntry) -> Self {
        SignatureSlot::Entry(entry)
    }
}

/// A signed message. Unknown top-level fields are dropped on parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub hash: HashHeader,
    pub payload: Value,
    #[serde(default)]
    pub signatures: Vec<SignatureSlot>,
}

// ---------------------------------------------------------------------------
// Canonical JSON
// ---------------------------------------------------------------------------

/// Render `value` as compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (key, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a string cannot fail.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

impl Envelope {
    /// Wrap `payload` with a freshly computed hash and no signatures.
    ///
    /// This is how the ledger writes its own records.
    pub fn seal(payload: Value, algorithm: DigestAlgorithm) -> Self {
        let value = algorithm.digest_hex(canonical_json(&payload).as_bytes());
        Self {
            hash: HashHeader {
                kind: algorithm.as_str().to_string(),
                value,
            },
            payload,
            signatures: Vec::new(),
        }
    }

    /// Seal a typed payload.
    pub fn seal_typed<T: Serialize>(
        payload: &T,
        algorithm: DigestAlgorithm,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::seal(serde_json::to_value(payload)?, algorithm))
    }

    /// Deserialize the payload into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Check the declared digest against the payload.
    ///
    /// Comparison is byte-for-byte on the hex string, so an uppercase digest
    /// is rejected even if it encodes the right bytes.
    pub fn validate_hash(&self, config: &LedgerConfig) -> Result<DigestAlgorithm, EnvelopeError> {
        let algorithm: DigestAlgorithm = self
            .hash
            .kind
            .parse()
            .map_err(|_| EnvelopeError::InvalidHashType(self.hash.kind.clone()))?;
        if !config.accepts_digest(algorithm) {
            return Err(EnvelopeError::InvalidHashType(self.hash.kind.clone()));
        }

        let expected = algorithm.digest_hex(canonical_json(&self.payload).as_bytes());
        if expected != self.hash.value {
            return Err(EnvelopeError::InvalidHashValue);
        }
        Ok(algorithm)
    }

    /// The bytes signers sign: `hash.value` decoded from hex.
    pub fn digest_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        hex::decode(&self.hash.value).map_err(|_| EnvelopeError::InvalidHashValue)
    }

    /// Verify the signature at `index` against a hex public key.
    pub fn verify_signature_at(
        &self,
        index: usize,
        public_key: Option<&str>,
        config: &LedgerConfig,
    ) -> Result<(), EnvelopeError> {
        let digest = self.digest_bytes()?;
        let slot = self
            .signatures
            .get(index)
            .ok_or(EnvelopeError::MissingSignature(index))?;
        verify_signature(&digest, slot, index, public_key, config)
    }

    /// Count valid signatures against a signer set and compare to `threshold`.
    ///
    /// Each declared signature is resolved through its `kid`. Malformed or
    /// unresolvable entries count as invalid and land in the tally's
    /// failures. A `kid` contributes at most one valid signature.
    pub fn verify_threshold(
        &self,
        signers: &SignerSet,
        threshold: usize,
        config: &LedgerConfig,
    ) -> Result<Tally, EnvelopeError> {
        let digest = self.digest_bytes()?;
        let mut tally = Tally::default();
        let mut counted: Vec<&str> = Vec::new();

        for (index, slot) in self.signatures.iter().enumerate() {
            let kid = slot.kid();
            if let Some(kid) = kid {
                if counted.contains(&kid) {
                    tracing::debug!(kid, "duplicate signer ignored");
                    continue;
                }
            }

            let public_key = kid.and_then(|k| signers.get(k));
            if public_key.is_some() {
                tally.resolved += 1;
            }

            match verify_signature(&digest, slot, index, public_key, config) {
                Ok(()) => {
                    tally.valid += 1;
                    if let Some(kid) = kid {
                        counted.push(kid);
                    }
                }
                Err(err) => tally.failures.push(err),
            }
        }

        if tally.valid >= threshold {
            Ok(tally)
        } else {
            Err(EnvelopeError::ThresholdNotMet {
                valid: tally.valid,
                threshold,
                failures: tally.failures,
            })
        }
    }
}

/// Verify one signature slot over `digest`.
///
/// Scheme lookup comes first, then the key, then the check itself. Every
/// failure mode is a typed error.
pub fn verify_signature(
    digest: &[u8],
    slot: &SignatureSlot,
    index: usize,
    public_key: Option<&str>,
    config: &LedgerConfig,
) -> Result<(), EnvelopeError> {
    let entry = slot.entry().ok_or(EnvelopeError::MissingSignature(index))?;
    let signer = entry
        .header
        .kid
        .clone()
        .unwrap_or_else(|| format!("#{index}"));

    let scheme: SignatureScheme = entry
        .header
        .alg
        .parse()
        .map_err(|_| EnvelopeError::InvalidSignatureAlgorithm(entry.header.alg.clone()))?;
    if !config.accepts_scheme(scheme) {
        return Err(EnvelopeError::InvalidSignatureAlgorithm(entry.header.alg.clone()));
    }

    let public_key = public_key.ok_or_else(|| EnvelopeError::MissingPublicKey(signer.clone()))?;
    let key_bytes =
        hex::decode(public_key).map_err(|_| EnvelopeError::InvalidSignature(signer.clone()))?;
    let sig_bytes =
        hex::decode(&entry.signature).map_err(|_| EnvelopeError::InvalidSignature(signer.clone()))?;

    scheme
        .verify(&key_bytes, digest, &sig_bytes)
        .map_err(|err| {
            tracing::debug!(signer = %signer, error = %err, "signature rejected");
            EnvelopeError::InvalidSignature(signer)
        })
}

// ---------------------------------------------------------------------------
// Signer Sets
// ---------------------------------------------------------------------------

/// Public keys addressable by `kid`.
///
/// A single-key account is addressed by its address; a multi-key account by
/// `address:index`, one entry per registered key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerSet {
    keys: BTreeMap<String, String>,
}

impl SignerSet {
    /// Build the signer set of an account from its registered keys.
    pub fn for_account(address: &str, keys: &[String]) -> Self {
        let keys = match keys {
            [single] => BTreeMap::from([(address.to_string(), single.clone())]),
            many => many
                .iter()
                .enumerate()
                .map(|(i, key)| (format!("{address}:{i}"), key.clone()))
                .collect(),
        };
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Outcome of a threshold check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Signatures that verified, one per distinct `kid`.
    pub valid: usize,
    /// Signatures whose `kid` resolved to a registered key.
    pub resolved: usize,
    /// Why each remaining signature was rejected.
    pub failures: Vec<EnvelopeError>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
