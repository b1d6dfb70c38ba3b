//! Typed payloads for every document the ledger reads or writes.
//!
//! Balances and limits are [`Decimal`]s, serialized as decimal strings
//! (`"87.66"`), never as binary floats. Fields that are `null` in a genesis
//! record are `Option`s here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{GENESIS_BALANCE, GENESIS_LIMIT};
use crate::identity::AddressClass;

/// Payload of an account-creation envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPayload {
    pub address: String,
    /// Hex-encoded public keys. `keys[0]` determines the address.
    pub keys: Vec<String>,
    /// Valid signatures a transfer from this account needs.
    pub threshold: usize,
}

/// Lower and upper balance bounds. `None` means unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub lower: Option<Decimal>,
    pub upper: Option<Decimal>,
}

impl Limits {
    /// Bearers can't go negative and can receive without limit.
    pub fn bearer() -> Self {
        Self {
            lower: Some(genesis_limit()),
            upper: None,
        }
    }

    /// Issuers can go arbitrarily negative (that's minting) but never
    /// positive.
    pub fn issuer() -> Self {
        Self {
            lower: None,
            upper: Some(genesis_limit()),
        }
    }

    pub fn for_class(class: AddressClass) -> Self {
        match class {
            AddressClass::Issuer => Self::issuer(),
            AddressClass::Bearer => Self::bearer(),
        }
    }
}

fn genesis_limit() -> Decimal {
    GENESIS_LIMIT.parse().unwrap_or(Decimal::ZERO)
}

/// What moved on one leg of a transfer.
///
/// All `None` on genesis records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegMetadata {
    /// Chain position written on the counterpart's side.
    pub count: Option<u64>,
    /// 0 for the debit leg, 1 for the credit leg.
    pub index: Option<u8>,
    /// Signed amount applied to this account.
    pub delta: Option<Decimal>,
    /// Hash of the transfer request (the IOU key).
    pub hash: Option<String>,
    #[serde(default)]
    pub counterpart: Option<String>,
}

/// One element of an account's transaction chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTransaction {
    /// 0-based chain position. Equals the account counter when written.
    pub count: u64,
    pub address: String,
    pub balance: Decimal,
    pub currency: Option<String>,
    pub limits: Limits,
    pub transaction: LegMetadata,
    /// Store key of the prior record, `None` at genesis.
    pub previous: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
}

impl AddressTransaction {
    /// Chain position 0 for a freshly created account.
    pub fn genesis(
        address: &str,
        class: AddressClass,
        currency: Option<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            count: 0,
            address: address.to_string(),
            balance: GENESIS_BALANCE.parse().unwrap_or(Decimal::ZERO),
            currency,
            limits: Limits::for_class(class),
            transaction: LegMetadata::default(),
            previous: None,
            timestamp: Some(timestamp),
        }
    }
}

/// Currency metadata carried by a currency's genesis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyMeta {
    pub code: String,
    pub issuer: String,
    pub supply: Decimal,
    pub credit: Option<Decimal>,
    pub ceiling: Option<Decimal>,
    pub delta: Option<Decimal>,
}

/// One element of a currency's transaction chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTransaction {
    pub count: u64,
    pub amount: Option<Decimal>,
    pub currency: CurrencyMeta,
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub outputs: Vec<Value>,
    pub previous: Option<String>,
}

impl CurrencyTransaction {
    pub fn genesis(code: &str, issuer: &str) -> Self {
        Self {
            count: 0,
            amount: None,
            currency: CurrencyMeta {
                code: code.to_string(),
                issuer: issuer.to_string(),
                supply: Decimal::ZERO,
                credit: None,
                ceiling: None,
                delta: None,
            },
            inputs: Vec::new(),
            outputs: Vec::new(),
            previous: None,
        }
    }
}

/// A pointer document: `key` resolves to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub key: String,
    pub value: String,
}

/// Payload of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    /// Source address.
    pub sub: String,
    /// Destination address.
    pub aud: String,
    /// Amount as a decimal string.
    pub amt: String,
}

/// The read-address-balance view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub balance: Decimal,
    pub currency: Option<String>,
    pub limits: Limits,
}

impl From<&AddressTransaction> for AddressBalance {
    fn from(record: &AddressTransaction) -> Self {
        Self {
            balance: record.balance,
            currency: record.currency.clone(),
            limits: record.limits.clone(),
        }
    }
}

/// Outcome of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Cleared,
}

/// What `request_transfer` returns once both legs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub status: TransferStatus,
    /// Hash of the transfer request.
    pub hash: String,
    /// Chain position written on the source account.
    pub source_count: u64,
    /// Chain position written on the destination account.
    pub destination_count: u64,
}
