//! # Ledger Services
//!
//! The ledger proper: three services over one injected store, and a facade
//! that exposes the public operations.
//!
//! ```text
//! Ledger ─┬─> AddressService ─────────────┐
//!         ├─> CurrencyService ─> Address  ├──> LedgerStore
//!         └─> TransactionService ─> Addr. ┘
//! ```
//!
//! Services hold an `Arc` to the store and to the [`LedgerConfig`], nothing
//! else. There is no cross-request state and no in-process locking; all
//! coordination happens through the store's create-if-absent and atomic
//! increment.

pub mod address;
pub mod balance;
pub mod currency;
pub mod records;
pub mod transaction;

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::envelope::Envelope;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::AddressClass;
use crate::storage::{self, keys, LedgerStore, StoreError};

pub use address::{AddressService, ChainHead};
pub use balance::{compute_balances, Balances};
pub use currency::CurrencyService;
pub use records::{
    AccountPayload, AddressBalance, AddressTransaction, CurrencyMeta, CurrencyTransaction,
    LegMetadata, Limits, Lookup, TransferPayload, TransferReceipt, TransferStatus,
};
pub use transaction::TransactionService;

/// Public entry point to the ledger.
///
/// Cheap to clone; share one per process.
pub struct Ledger<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
    addresses: AddressService<S>,
    currencies: CurrencyService<S>,
    transactions: TransactionService<S>,
}

impl<S: LedgerStore + ?Sized> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            addresses: self.addresses.clone(),
            currencies: self.currencies.clone(),
            transactions: self.transactions.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> Ledger<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        let config = Arc::new(config);
        let addresses = AddressService::new(Arc::clone(&store), Arc::clone(&config));
        let currencies =
            CurrencyService::new(Arc::clone(&store), Arc::clone(&config), addresses.clone());
        let transactions =
            TransactionService::new(Arc::clone(&store), Arc::clone(&config), addresses.clone());
        Self {
            store,
            config,
            addresses,
            currencies,
            transactions,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create the global counters. Idempotent; returns whether anything was
    /// created.
    pub async fn initialize(&self) -> LedgerResult<bool> {
        match storage::create_counter(self.store.as_ref(), keys::CURRENCY_COUNTER, 0).await {
            Ok(()) => {
                tracing::info!("ledger counters initialized");
                Ok(true)
            }
            Err(StoreError::KeyAlreadyExists(_)) => Ok(false),
            Err(other) => Err(other.into()),
        }
    }

    /// Create a bearer account. Issuer accounts only come into existence
    /// through [`Ledger::create_currency`].
    pub async fn create_address(&self, envelope: Envelope) -> LedgerResult<Envelope> {
        let address = envelope
            .payload
            .get("address")
            .and_then(|a| a.as_str())
            .unwrap_or_default();
        if AddressClass::from_marker(address) != AddressClass::Bearer {
            return Err(LedgerError::InvalidAddress(format!(
                "{address} is not a bearer address"
            )));
        }
        self.addresses.create_address(envelope).await
    }

    /// Create an issuer account and the currency it owns.
    pub async fn create_currency(&self, envelope: Envelope) -> LedgerResult<Envelope> {
        self.currencies.issue_currency(envelope).await
    }

    /// Authorize and clear a transfer request.
    pub async fn request_transfer(&self, envelope: Envelope) -> LedgerResult<TransferReceipt> {
        self.transactions.request_transfer(envelope).await
    }

    pub async fn read_address_balance(&self, address: &str) -> LedgerResult<AddressBalance> {
        self.addresses.read_balance(address).await
    }

    /// Full chain of an account, newest first.
    pub async fn read_transaction_history(
        &self,
        address: &str,
    ) -> LedgerResult<Vec<AddressTransaction>> {
        self.addresses.read_history(address).await
    }

    /// A persisted transfer request.
    pub async fn read_transaction_request(&self, hash: &str) -> LedgerResult<Envelope> {
        self.transactions.read_request(hash).await
    }

    pub async fn read_currency(&self, code: &str) -> LedgerResult<CurrencyMeta> {
        self.currencies.read_currency(code).await
    }

    pub async fn read_currency_by_sequence(&self, sequence: u64) -> LedgerResult<CurrencyMeta> {
        self.currencies.read_currency_by_sequence(sequence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DigestAlgorithm;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let ledger = ledger();
        assert!(ledger.initialize().await.unwrap());
        assert!(!ledger.initialize().await.unwrap());
        assert_eq!(ledger.store().len(), 1);
    }

    #[tokio::test]
    async fn create_address_refuses_issuer_marker() {
        let ledger = ledger();
        let envelope = Envelope::seal(
            json!({"address": "cSomething", "keys": ["00"], "threshold": 1}),
            DigestAlgorithm::Sha256,
        );
        let err = ledger.create_address(envelope).await.unwrap_err();
        assert_eq!(err.code(), "invalid-address");
        assert!(ledger.store().is_empty());
    }

    #[tokio::test]
    async fn create_currency_refuses_bearer_marker() {
        let ledger = ledger();
        let envelope = Envelope::seal(
            json!({"address": "wSomething", "keys": ["00"], "threshold": 1}),
            DigestAlgorithm::Sha256,
        );
        let err = ledger.create_currency(envelope).await.unwrap_err();
        assert_eq!(err.code(), "invalid-address");
    }

    #[tokio::test]
    async fn malformed_account_payload() {
        let ledger = ledger();
        let envelope = Envelope::seal(json!({"address": "wX"}), DigestAlgorithm::Sha256);
        let err = ledger.create_address(envelope).await.unwrap_err();
        assert_eq!(err.code(), "malformed-payload");
    }

    #[tokio::test]
    async fn reads_of_unknown_things() {
        let ledger = ledger();
        assert_eq!(
            ledger.read_address_balance("wNobody").await.unwrap_err().code(),
            "address-not-found"
        );
        assert_eq!(
            ledger.read_currency("NOPE").await.unwrap_err().code(),
            "currency-not-found"
        );
        assert_eq!(
            ledger.read_currency_by_sequence(9).await.unwrap_err().code(),
            "currency-not-found"
        );
        assert_eq!(
            ledger.read_transaction_request("abc").await.unwrap_err().code(),
            "not-found"
        );
    }
}
