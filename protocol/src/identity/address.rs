//! # Address Codec
//!
//! Pure, deterministic conversion between public keys and ledger addresses.
//! No I/O and no randomness: the same key and class always give the same
//! address, on every node, forever.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{
    LedgerConfig, CURRENCY_CODE_LENGTH, CURRENCY_CODE_OFFSET, ISSUER_MARKER, KEY_HASH_LENGTH,
};
use crate::crypto::hash::key_hash;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not valid Base58, or the checksum doesn't match.
    #[error("base58check decode error: {0}")]
    Decode(String),

    /// The decoded payload has the wrong length.
    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    /// The version byte is neither the issuer nor the bearer prefix.
    #[error("unknown address prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// The address is too short to carry a currency code.
    #[error("address too short for a currency code: {0}")]
    NoCurrencyCode(String),
}

// ---------------------------------------------------------------------------
// Address Class
// ---------------------------------------------------------------------------

/// Issuers mint by running negative; bearers hold value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressClass {
    Issuer,
    Bearer,
}

impl AddressClass {
    /// Class implied by an address's first character.
    ///
    /// Only the issuer marker is checked; everything else is a bearer.
    pub fn from_marker(address: &str) -> Self {
        if address.starts_with(ISSUER_MARKER) {
            AddressClass::Issuer
        } else {
            AddressClass::Bearer
        }
    }

    /// Version byte for this class.
    pub fn prefix(&self, config: &LedgerConfig) -> u8 {
        match self {
            AddressClass::Issuer => config.issuer_prefix,
            AddressClass::Bearer => config.bearer_prefix,
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressClass::Issuer => f.write_str("issuer"),
            AddressClass::Bearer => f.write_str("bearer"),
        }
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the address of `public_key` for the given class.
///
/// # Example
///
/// ```
/// use tally_protocol::config::LedgerConfig;
/// use tally_protocol::identity::{derive_address, AddressClass};
///
/// let config = LedgerConfig::default();
/// let address = derive_address(&[7u8; 32], AddressClass::Bearer, &config);
/// assert!(address.starts_with('w'));
/// ```
pub fn derive_address(public_key: &[u8], class: AddressClass, config: &LedgerConfig) -> String {
    let hash = key_hash(config.default_digest, public_key);
    let mut payload = Vec::with_capacity(1 + KEY_HASH_LENGTH);
    payload.push(class.prefix(config));
    payload.extend_from_slice(&hash);
    bs58::encode(payload).with_check().into_string()
}

/// A decoded, checksum-verified address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub class: AddressClass,
    pub key_hash: [u8; KEY_HASH_LENGTH],
}

/// Decode and validate an address string.
pub fn decode_address(address: &str, config: &LedgerConfig) -> Result<DecodedAddress, AddressError> {
    let bytes = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::Decode(e.to_string()))?;

    if bytes.len() != 1 + KEY_HASH_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: 1 + KEY_HASH_LENGTH,
            got: bytes.len(),
        });
    }

    let class = match bytes[0] {
        p if p == config.issuer_prefix => AddressClass::Issuer,
        p if p == config.bearer_prefix => AddressClass::Bearer,
        other => return Err(AddressError::UnknownPrefix(other)),
    };

    let mut key_hash = [0u8; KEY_HASH_LENGTH];
    key_hash.copy_from_slice(&bytes[1..]);
    Ok(DecodedAddress { class, key_hash })
}

/// Currency code owned by an issuer address.
///
/// The code is a fixed window of the address text, right after the class
/// marker. Both issuer genesis records and currency issuance go through here.
pub fn currency_code(address: &str) -> Result<String, AddressError> {
    address
        .get(CURRENCY_CODE_OFFSET..CURRENCY_CODE_OFFSET + CURRENCY_CODE_LENGTH)
        .map(str::to_string)
        .ok_or_else(|| AddressError::NoCurrencyCode(address.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerConfig {
        LedgerConfig::default()
    }

    #[test]
    fn derivation_is_deterministic() {
        let key = [42u8; 32];
        let a = derive_address(&key, AddressClass::Bearer, &config());
        let b = derive_address(&key, AddressClass::Bearer, &config());
        assert_eq!(a, b);
    }

    #[test]
    fn class_changes_address_and_marker() {
        let key = [42u8; 32];
        let issuer = derive_address(&key, AddressClass::Issuer, &config());
        let bearer = derive_address(&key, AddressClass::Bearer, &config());
        assert_ne!(issuer, bearer);
        assert!(issuer.starts_with('c'), "issuer address {issuer}");
        assert!(bearer.starts_with('w'), "bearer address {bearer}");
        assert_eq!(AddressClass::from_marker(&issuer), AddressClass::Issuer);
        assert_eq!(AddressClass::from_marker(&bearer), AddressClass::Bearer);
    }

    #[test]
    fn markers_hold_across_many_keys() {
        for seed in 0u8..=64 {
            let key = [seed; 33];
            assert!(derive_address(&key, AddressClass::Issuer, &config()).starts_with('c'));
            assert!(derive_address(&key, AddressClass::Bearer, &config()).starts_with('w'));
        }
    }

    #[test]
    fn different_keys_give_different_addresses() {
        let a = derive_address(&[1u8; 32], AddressClass::Bearer, &config());
        let b = derive_address(&[2u8; 32], AddressClass::Bearer, &config());
        assert_ne!(a, b);
    }

    #[test]
    fn decode_recovers_class_and_hash() {
        let key = [9u8; 32];
        let address = derive_address(&key, AddressClass::Issuer, &config());
        let decoded = decode_address(&address, &config()).unwrap();
        assert_eq!(decoded.class, AddressClass::Issuer);
        assert_eq!(decoded.key_hash, key_hash(config().default_digest, &key));
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let address = derive_address(&[9u8; 32], AddressClass::Bearer, &config());
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        let corrupted: String = chars.into_iter().collect();
        assert!(matches!(
            decode_address(&corrupted, &config()),
            Err(AddressError::Decode(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_address("not an address", &config()).is_err());
        assert!(decode_address("", &config()).is_err());
    }

    #[test]
    fn currency_code_window_is_pinned() {
        // Offset 1, length 10. Moving this window orphans every currency.
        assert_eq!(currency_code("cABCDEFGHIJKLMN").unwrap(), "ABCDEFGHIJ");
        assert!(currency_code("cSHORT").is_err());
    }

    #[test]
    fn currency_code_of_real_issuer() {
        let address = derive_address(&[3u8; 32], AddressClass::Issuer, &config());
        let code = currency_code(&address).unwrap();
        assert_eq!(code.len(), 10);
        assert_eq!(&address[1..11], code);
    }
}
