//! # Ledger Configuration & Constants
//!
//! Every magic number in Tally lives here. Address prefixes, the currency
//! code window, the digest allow-list: if it changes the shape of data on
//! disk, it belongs in this file and nowhere else.
//!
//! Changing the prefixes or the code window after accounts exist silently
//! orphans every record keyed by the old values. Don't.
//!
//! [`LedgerConfig`] is the runtime-loaded half of this module. It is built
//! once at startup (from defaults or CLI flags) and shared read-only by every
//! service through an `Arc`.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::DigestAlgorithm;
use crate::crypto::signatures::SignatureScheme;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Ledger format version. Bump when stored document layouts change.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Address Classes
// ---------------------------------------------------------------------------

/// Version byte for issuer addresses. Base58Check renders it as a leading `c`.
pub const ISSUER_PREFIX: u8 = 0x57;

/// Version byte for bearer addresses. Base58Check renders it as a leading `w`.
pub const BEARER_PREFIX: u8 = 0x87;

/// First character of every issuer address.
pub const ISSUER_MARKER: char = 'c';

/// First character of every bearer address.
pub const BEARER_MARKER: char = 'w';

/// Length of the RIPEMD-160 key hash embedded in an address.
pub const KEY_HASH_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Currency Codes
// ---------------------------------------------------------------------------

/// Where the currency code starts inside an issuer address.
///
/// Offset 1 skips the class marker. Pinned by a test in `identity::address`;
/// if you touch this, every existing currency becomes unreachable.
pub const CURRENCY_CODE_OFFSET: usize = 1;

/// Number of address characters that make up a currency code.
pub const CURRENCY_CODE_LENGTH: usize = 10;

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Balance written into every genesis record.
pub const GENESIS_BALANCE: &str = "0";

/// Limit bound applied to genesis records (bearer lower, issuer upper).
pub const GENESIS_LIMIT: &str = "0";

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Static configuration shared by all ledger services.
///
/// Loaded once. Services never mutate it, so it travels as `Arc<LedgerConfig>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Digest algorithms accepted in `hash.type`.
    pub valid_hashes: Vec<DigestAlgorithm>,
    /// Digest used when the ledger seals its own records and derives addresses.
    pub default_digest: DigestAlgorithm,
    /// Signature schemes accepted in `header.alg`.
    pub schemes: Vec<SignatureScheme>,
    /// Address version byte for issuers.
    pub issuer_prefix: u8,
    /// Address version byte for bearers.
    pub bearer_prefix: u8,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            valid_hashes: vec![DigestAlgorithm::Sha256],
            default_digest: DigestAlgorithm::Sha256,
            schemes: vec![SignatureScheme::Ed25519, SignatureScheme::Secp256k1],
            issuer_prefix: ISSUER_PREFIX,
            bearer_prefix: BEARER_PREFIX,
        }
    }
}

impl LedgerConfig {
    /// Replace the digest allow-list. The default digest is always kept allowed.
    pub fn with_valid_hashes(mut self, hashes: Vec<DigestAlgorithm>) -> Self {
        self.valid_hashes = hashes;
        if !self.valid_hashes.contains(&self.default_digest) {
            self.valid_hashes.push(self.default_digest);
        }
        self
    }

    /// Whether `algorithm` may appear in an envelope's `hash.type`.
    pub fn accepts_digest(&self, algorithm: DigestAlgorithm) -> bool {
        self.valid_hashes.contains(&algorithm)
    }

    /// Whether `scheme` is registered for signature verification.
    pub fn accepts_scheme(&self, scheme: SignatureScheme) -> bool {
        self.schemes.contains(&scheme)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
