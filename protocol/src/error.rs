//! # Ledger Errors
//!
//! The single error type every service returns. Each variant maps to one
//! stable, machine-readable name via [`LedgerError::code`]; that name is what
//! clients see, so treat the strings as API.

use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::storage::StoreError;

/// Result alias used by every ledger service.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Hash or signature failure from the envelope validator, passed through
    /// with its own code.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Address doesn't match its key, doesn't decode, or has the wrong class.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// `threshold` is zero or larger than the number of keys.
    #[error("invalid threshold {threshold} for {keys} keys")]
    InvalidAddressThreshold { threshold: usize, keys: usize },

    /// Account creation needs one signature per key.
    #[error("{present} signatures for {required} keys")]
    MissingAddressSignatures { required: usize, present: usize },

    /// At least one key failed to sign the account envelope.
    #[error("account signatures failed verification ({} failures)", failures.len())]
    SignatureVerificationError { failures: Vec<EnvelopeError> },

    /// Threshold not met on a transfer.
    #[error("{valid} valid source signatures, threshold is {threshold}")]
    SignatureVerificationFailed { valid: usize, threshold: usize },

    /// No signature on a transfer resolved to a key of the source account.
    #[error("no signature from the source account")]
    MissingSourceSignatures,

    /// The transfer request was already persisted.
    #[error("transfer request {0} was cleared before")]
    IouClearedBefore(String),

    #[error("currency mismatch: account holds {expected}, transfer carries {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Debit would take the source below its lower limit.
    #[error("unavailable funds on {0}")]
    UnavailableFunds(String),

    /// Credit would take the destination above its upper limit.
    #[error("unreceivable funds on {0}")]
    UnreceivableFunds(String),

    /// Arithmetic overflowed or left a balance unchanged.
    #[error("balance computation failed: {0}")]
    BalanceComputationFailed(String),

    /// Another settlement advanced the account's counter concurrently.
    #[error("race condition on {0}")]
    RaceConditionFound(String),

    /// The first leg committed, the second didn't. Needs reconciliation.
    #[error("transfer partially settled: {committed} committed, then {cause}")]
    PartiallySettled {
        committed: String,
        cause: Box<LedgerError>,
    },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("currency not found: {0}")]
    CurrencyNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A document the operation creates is already there.
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// A stored document doesn't deserialize or breaks chain invariants.
    #[error("corrupted record at {0}")]
    CorruptedRecord(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl LedgerError {
    /// Machine-readable error name.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Envelope(inner) => inner.code(),
            LedgerError::InvalidAddress(_) => "invalid-address",
            LedgerError::InvalidAddressThreshold { .. } => "invalid-address-threshold",
            LedgerError::MissingAddressSignatures { .. } => "missing-address-signatures",
            LedgerError::SignatureVerificationError { .. } => "signature-verification-error",
            LedgerError::SignatureVerificationFailed { .. } => "signature-verification-failed",
            LedgerError::MissingSourceSignatures => "missing-source-signatures",
            LedgerError::IouClearedBefore(_) => "iou-cleared-before",
            LedgerError::CurrencyMismatch { .. } => "currency-mismatch",
            LedgerError::UnavailableFunds(_) => "unavailable-funds",
            LedgerError::UnreceivableFunds(_) => "unreceivable-funds",
            LedgerError::BalanceComputationFailed(_) => "balance-computation-failed",
            LedgerError::RaceConditionFound(_) => "race-condition-found",
            LedgerError::PartiallySettled { .. } => "partially-settled",
            LedgerError::MalformedPayload(_) => "malformed-payload",
            LedgerError::InvalidAmount(_) => "invalid-amount",
            LedgerError::AddressNotFound(_) => "address-not-found",
            LedgerError::CurrencyNotFound(_) => "currency-not-found",
            LedgerError::NotFound(_) => "not-found",
            LedgerError::AlreadyExists(_) => "key-already-exists",
            LedgerError::CorruptedRecord(_) => "corrupted-record",
            LedgerError::Store(_) => "store-error",
        }
    }
}

/// Default translation. Call sites that know better map the error themselves
/// (e.g. an existing IOU becomes [`LedgerError::IouClearedBefore`]).
impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => LedgerError::NotFound(key),
            StoreError::KeyAlreadyExists(key) => LedgerError::AlreadyExists(key),
            other => LedgerError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_errors_keep_their_code() {
        let err: LedgerError = EnvelopeError::InvalidHashValue.into();
        assert_eq!(err.code(), "invalid-hash-value");
    }

    #[test]
    fn store_errors_translate_by_kind() {
        let err: LedgerError = StoreError::NotFound("k".into()).into();
        assert_eq!(err.code(), "not-found");
        let err: LedgerError = StoreError::Backend("io".into()).into();
        assert_eq!(err.code(), "store-error");
    }

    #[test]
    fn partial_settlement_names_the_committed_side() {
        let err = LedgerError::PartiallySettled {
            committed: "wSource".into(),
            cause: Box::new(LedgerError::RaceConditionFound("wDest".into())),
        };
        assert_eq!(err.code(), "partially-settled");
        assert!(err.to_string().contains("wSource"));
        assert!(err.to_string().contains("wDest"));
    }
}
