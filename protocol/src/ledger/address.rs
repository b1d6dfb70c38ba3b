//! # Address Service
//!
//! Creates accounts and reads their chains.
//!
//! Account creation is self-certifying: the envelope carries the keys, the
//! address derived from `keys[0]`, and one signature per key over its own
//! digest. Nothing is looked up; everything is checked against the envelope
//! itself before a single document is written.
//!
//! A created account is three documents:
//!
//! ```text
//! address::{a}                    the account envelope, verbatim
//! address::{a}::transaction       counter, starts at 0
//! address::{a}::transaction::0    genesis record (balance 0, class limits)
//! ```

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::envelope::Envelope;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{currency_code, derive_address, AddressClass};
use crate::storage::{self, keys, LedgerStore, StoreError};

use super::records::{AccountPayload, AddressBalance, AddressTransaction};

/// Latest record of an account chain, with where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    /// Counter value when read.
    pub counter: u64,
    /// Store key of the record at `counter`.
    pub key: String,
    pub record: AddressTransaction,
}

pub struct AddressService<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
}

impl<S: LedgerStore + ?Sized> Clone for AddressService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: LedgerStore + ?Sized> AddressService<S> {
    pub fn new(store: Arc<S>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    /// Validate an account envelope and materialize the account.
    ///
    /// Returns the envelope as stored.
    pub async fn create_address(&self, envelope: Envelope) -> LedgerResult<Envelope> {
        let account: AccountPayload = envelope
            .payload_as()
            .map_err(|e| LedgerError::MalformedPayload(e.to_string()))?;
        let class = AddressClass::from_marker(&account.address);

        let primary = account
            .keys
            .first()
            .ok_or_else(|| LedgerError::InvalidAddress("account has no keys".into()))?;
        let primary = hex::decode(primary)
            .map_err(|_| LedgerError::InvalidAddress("primary key is not hex".into()))?;
        let derived = derive_address(&primary, class, &self.config);
        if derived != account.address {
            return Err(LedgerError::InvalidAddress(account.address));
        }

        envelope.validate_hash(&self.config)?;

        if account.threshold == 0 || account.threshold > account.keys.len() {
            return Err(LedgerError::InvalidAddressThreshold {
                threshold: account.threshold,
                keys: account.keys.len(),
            });
        }
        if envelope.signatures.len() < account.keys.len() {
            return Err(LedgerError::MissingAddressSignatures {
                required: account.keys.len(),
                present: envelope.signatures.len(),
            });
        }

        // Signature i must come from key i. Every key signs at creation,
        // whatever the threshold.
        let failures: Vec<_> = account
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                envelope
                    .verify_signature_at(i, Some(key), &self.config)
                    .err()
            })
            .collect();
        if !failures.is_empty() {
            return Err(LedgerError::SignatureVerificationError { failures });
        }

        let currency = match class {
            AddressClass::Issuer => Some(
                currency_code(&account.address)
                    .map_err(|e| LedgerError::InvalidAddress(e.to_string()))?,
            ),
            AddressClass::Bearer => None,
        };
        let genesis = AddressTransaction::genesis(
            &account.address,
            class,
            currency,
            chrono::Utc::now().timestamp_millis(),
        );
        let genesis = Envelope::seal_typed(&genesis, self.config.default_digest)
            .map_err(|e| LedgerError::Store(StoreError::Serialization(e.to_string())))?;

        // The account document doubles as the uniqueness guard: if it
        // already exists nothing else is attempted.
        storage::create_json(self.store.as_ref(), &keys::account(&account.address), &envelope)
            .await?;
        let counter_key = keys::account_counter(&account.address);
        let genesis_key = keys::account_record(&account.address, 0);
        futures::try_join!(
            storage::create_counter(self.store.as_ref(), &counter_key, 0),
            storage::create_json(self.store.as_ref(), &genesis_key, &genesis),
        )?;

        tracing::info!(
            address = %account.address,
            class = %class,
            keys = account.keys.len(),
            threshold = account.threshold,
            "account created"
        );
        Ok(envelope)
    }

    /// The stored account payload (address, keys, threshold).
    pub async fn read_account(&self, address: &str) -> LedgerResult<AccountPayload> {
        let key = keys::account(address);
        let envelope: Envelope = storage::read_json(self.store.as_ref(), &key)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => LedgerError::AddressNotFound(address.to_string()),
                StoreError::Serialization(_) => LedgerError::CorruptedRecord(key.clone()),
                other => other.into(),
            })?;
        envelope
            .payload_as()
            .map_err(|_| LedgerError::CorruptedRecord(key))
    }

    /// Counter and latest record of an account, integrity-checked.
    pub async fn read_head(&self, address: &str) -> LedgerResult<ChainHead> {
        let counter = storage::read_counter(self.store.as_ref(), &keys::account_counter(address))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => LedgerError::AddressNotFound(address.to_string()),
                other => other.into(),
            })?;
        let key = keys::account_record(address, counter);
        let record = self.read_record(&key).await?;

        if record.count != counter || record.address != address {
            return Err(LedgerError::CorruptedRecord(key));
        }
        Ok(ChainHead {
            counter,
            key,
            record,
        })
    }

    /// Balance, currency and limits from the latest record.
    pub async fn read_balance(&self, address: &str) -> LedgerResult<AddressBalance> {
        let head = self.read_head(address).await?;
        Ok(AddressBalance::from(&head.record))
    }

    /// Every record of an account, newest first, down to genesis.
    pub async fn read_history(&self, address: &str) -> LedgerResult<Vec<AddressTransaction>> {
        let head = self.read_head(address).await?;
        let mut history = Vec::with_capacity(head.counter as usize + 1);
        let mut previous = head.record.previous.clone();
        let mut expected = head.counter;
        history.push(head.record);

        while let Some(key) = previous {
            let record = self.read_record(&key).await?;
            // Positions must strictly decrease or the walk could loop.
            if expected == 0 || record.count != expected - 1 {
                return Err(LedgerError::CorruptedRecord(key));
            }
            expected = record.count;
            previous = record.previous.clone();
            history.push(record);
        }

        if expected != 0 {
            return Err(LedgerError::CorruptedRecord(keys::account_record(
                address, expected,
            )));
        }
        Ok(history)
    }

    /// Read one sealed chain record and check its hash.
    async fn read_record(&self, key: &str) -> LedgerResult<AddressTransaction> {
        let envelope: Envelope = storage::read_json(self.store.as_ref(), key)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) | StoreError::Serialization(_) => {
                    LedgerError::CorruptedRecord(key.to_string())
                }
                other => other.into(),
            })?;
        envelope
            .validate_hash(&self.config)
            .map_err(|_| LedgerError::CorruptedRecord(key.to_string()))?;
        envelope
            .payload_as()
            .map_err(|_| LedgerError::CorruptedRecord(key.to_string()))
    }
}
