//! # Currency Service
//!
//! A currency is an issuer account plus bookkeeping. Issuing one creates the
//! issuer through [`AddressService`], draws the next global sequence number,
//! and writes:
//!
//! ```text
//! currency::lookup::{seq}                 sequence -> code
//! currency::{code}::address               1
//! currency::{code}::address::1            -> issuer address
//! currency::{code}::request               0
//! currency::{code}::transaction           0
//! currency::{code}::transaction::0        genesis {code, issuer}
//! ```

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::envelope::Envelope;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::{currency_code, AddressClass};
use crate::storage::{self, keys, LedgerStore, StoreError};

use super::address::AddressService;
use super::records::{AccountPayload, CurrencyMeta, CurrencyTransaction, Lookup};

pub struct CurrencyService<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
    addresses: AddressService<S>,
}

impl<S: LedgerStore + ?Sized> Clone for CurrencyService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            addresses: self.addresses.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> CurrencyService<S> {
    pub fn new(store: Arc<S>, config: Arc<LedgerConfig>, addresses: AddressService<S>) -> Self {
        Self {
            store,
            config,
            addresses,
        }
    }

    /// Create the issuer account and the currency it owns.
    ///
    /// Address-creation failures propagate unchanged. Returns the issuer's
    /// account envelope.
    pub async fn issue_currency(&self, envelope: Envelope) -> LedgerResult<Envelope> {
        let account: AccountPayload = envelope
            .payload_as()
            .map_err(|e| LedgerError::MalformedPayload(e.to_string()))?;
        if AddressClass::from_marker(&account.address) != AddressClass::Issuer {
            return Err(LedgerError::InvalidAddress(format!(
                "{} is not an issuer address",
                account.address
            )));
        }

        let envelope = self.addresses.create_address(envelope).await?;
        let issuer = account.address;
        let code =
            currency_code(&issuer).map_err(|e| LedgerError::InvalidAddress(e.to_string()))?;

        let sequence = storage::increment(self.store.as_ref(), keys::CURRENCY_COUNTER).await?;
        let lookup_key = keys::currency_lookup(sequence);
        storage::create_json(
            self.store.as_ref(),
            &lookup_key,
            &Lookup {
                key: lookup_key.clone(),
                value: code.clone(),
            },
        )
        .await?;

        let issuer_lookup_key = keys::currency_address_lookup(&code, 1);
        let issuer_lookup = Lookup {
            key: issuer_lookup_key.clone(),
            value: issuer.clone(),
        };
        let genesis = Envelope::seal_typed(
            &CurrencyTransaction::genesis(&code, &issuer),
            self.config.default_digest,
        )
        .map_err(|e| LedgerError::Store(StoreError::Serialization(e.to_string())))?;

        let address_counter = keys::currency_address_counter(&code);
        let request_counter = keys::currency_request_counter(&code);
        let transaction_counter = keys::currency_counter(&code);
        let genesis_key = keys::currency_record(&code, 0);
        let store = self.store.as_ref();
        futures::try_join!(
            storage::create_counter(store, &address_counter, 1),
            storage::create_json(store, &issuer_lookup_key, &issuer_lookup),
            storage::create_counter(store, &request_counter, 0),
            storage::create_counter(store, &transaction_counter, 0),
            storage::create_json(store, &genesis_key, &genesis),
        )?;

        tracing::info!(code = %code, issuer = %issuer, sequence, "currency issued");
        Ok(envelope)
    }

    /// Metadata of a currency, from its genesis record.
    pub async fn read_currency(&self, code: &str) -> LedgerResult<CurrencyMeta> {
        let key = keys::currency_record(code, 0);
        let envelope: Envelope = storage::read_json(self.store.as_ref(), &key)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => LedgerError::CurrencyNotFound(code.to_string()),
                StoreError::Serialization(_) => LedgerError::CorruptedRecord(key.clone()),
                other => other.into(),
            })?;
        let record: CurrencyTransaction = envelope
            .payload_as()
            .map_err(|_| LedgerError::CorruptedRecord(key))?;
        Ok(record.currency)
    }

    /// Metadata of the currency issued with sequence number `sequence`.
    pub async fn read_currency_by_sequence(&self, sequence: u64) -> LedgerResult<CurrencyMeta> {
        let lookup: Lookup =
            storage::read_json(self.store.as_ref(), &keys::currency_lookup(sequence))
                .await
                .map_err(|e| match e {
                    StoreError::NotFound(_) => LedgerError::CurrencyNotFound(sequence.to_string()),
                    other => other.into(),
                })?;
        self.read_currency(&lookup.value).await
    }
}
