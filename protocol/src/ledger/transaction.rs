//! # Transaction Service
//!
//! Clears transfer requests between two accounts.
//!
//! ## Lifecycle
//!
//! ```text
//! received ──validate──> authorized ──IOU──> settling ──both legs──> cleared
//!     │                      │                   │
//!     └──────────────────────┴───────────────────┴──> rejected
//! ```
//!
//! ## Settlement
//!
//! Settlement is a two-step saga with no cross-account atomicity:
//!
//! 1. Persist the request as an IOU keyed by its hash. This is the replay
//!    guard: the same request can never clear twice.
//! 2. Read both chain heads, compute new balances, then append one record to
//!    each chain, source first.
//!
//! Each leg writes its record at `counter + 1` with create-if-absent, then
//! advances the counter. A racing settlement on the same account either
//! loses the create or observes the counter jump by more than one; both
//! surface as `race-condition-found`. If the source leg committed and the
//! destination leg fails, the error is `partially-settled` and names the
//! committed side so an operator can reconcile.
//!
//! The destination counter is read again right before the source leg. If it
//! moved since the heads were read, the request fails with
//! `race-condition-found` and nothing but the IOU is written. Past that
//! check the window stays open: two payers crediting the same payee at the
//! same time can both debit, and the one that loses the destination create
//! gets `partially-settled` with cause `race-condition-found`. The payer is
//! debited, the payee is not credited.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::config::LedgerConfig;
use crate::envelope::{Envelope, EnvelopeError, SignerSet};
use crate::error::{LedgerError, LedgerResult};
use crate::identity::decode_address;
use crate::storage::{self, keys, LedgerStore, StoreError};

use super::address::{AddressService, ChainHead};
use super::balance::compute_balances;
use super::records::{
    AddressTransaction, LegMetadata, TransferPayload, TransferReceipt, TransferStatus,
};

/// Leg position of the debit record.
const DEBIT_LEG: u8 = 0;
/// Leg position of the credit record.
const CREDIT_LEG: u8 = 1;

/// A transfer request that passed validation.
#[derive(Debug, Clone)]
struct Transfer {
    hash: String,
    source: String,
    destination: String,
    amount: Decimal,
}

pub struct TransactionService<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
    addresses: AddressService<S>,
}

impl<S: LedgerStore + ?Sized> Clone for TransactionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            addresses: self.addresses.clone(),
        }
    }
}

impl<S: LedgerStore + ?Sized> TransactionService<S> {
    pub fn new(store: Arc<S>, config: Arc<LedgerConfig>, addresses: AddressService<S>) -> Self {
        Self {
            store,
            config,
            addresses,
        }
    }

    /// Authorize, persist and settle a transfer request.
    pub async fn request_transfer(&self, envelope: Envelope) -> LedgerResult<TransferReceipt> {
        envelope.validate_hash(&self.config)?;
        let transfer = self.parse_transfer(&envelope)?;

        // The source account's stored keys are the only authority.
        let source = self.addresses.read_account(&transfer.source).await?;
        self.addresses.read_account(&transfer.destination).await?;

        let signers = SignerSet::for_account(&source.address, &source.keys);
        let resolved = envelope
            .signatures
            .iter()
            .filter(|slot| slot.kid().and_then(|kid| signers.get(kid)).is_some())
            .count();
        if resolved == 0 {
            return Err(LedgerError::MissingSourceSignatures);
        }
        envelope
            .verify_threshold(&signers, source.threshold, &self.config)
            .map_err(|err| match err {
                EnvelopeError::ThresholdNotMet {
                    valid, threshold, ..
                } => LedgerError::SignatureVerificationFailed { valid, threshold },
                other => other.into(),
            })?;
        tracing::debug!(hash = %transfer.hash, "transfer authorized");

        storage::create_json(self.store.as_ref(), &keys::iou(&transfer.hash), &envelope)
            .await
            .map_err(|e| match e {
                StoreError::KeyAlreadyExists(_) => LedgerError::IouClearedBefore(transfer.hash.clone()),
                other => other.into(),
            })?;

        self.settle(&transfer).await
    }

    /// A persisted transfer request, by hash.
    pub async fn read_request(&self, hash: &str) -> LedgerResult<Envelope> {
        storage::read_json(self.store.as_ref(), &keys::iou(hash))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => LedgerError::NotFound(hash.to_string()),
                other => other.into(),
            })
    }

    fn parse_transfer(&self, envelope: &Envelope) -> LedgerResult<Transfer> {
        let payload: TransferPayload = envelope
            .payload_as()
            .map_err(|e| LedgerError::MalformedPayload(e.to_string()))?;

        for address in [&payload.sub, &payload.aud] {
            decode_address(address, &self.config)
                .map_err(|e| LedgerError::InvalidAddress(format!("{address}: {e}")))?;
        }
        if payload.sub == payload.aud {
            return Err(LedgerError::InvalidAddress(
                "source and destination are the same account".into(),
            ));
        }

        let amount = Decimal::from_str(&payload.amt)
            .map_err(|_| LedgerError::InvalidAmount(payload.amt.clone()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(LedgerError::InvalidAmount(payload.amt));
        }

        Ok(Transfer {
            hash: envelope.hash.value.clone(),
            source: payload.sub,
            destination: payload.aud,
            amount,
        })
    }

    async fn settle(&self, transfer: &Transfer) -> LedgerResult<TransferReceipt> {
        let (source, destination) = futures::try_join!(
            self.addresses.read_head(&transfer.source),
            self.addresses.read_head(&transfer.destination),
        )?;

        let balances = compute_balances(&source.record, &destination.record, transfer.amount)?;
        let timestamp = chrono::Utc::now().timestamp_millis();

        let debit = AddressTransaction {
            count: source.counter + 1,
            address: transfer.source.clone(),
            balance: balances.source,
            currency: source.record.currency.clone(),
            limits: source.record.limits.clone(),
            transaction: LegMetadata {
                count: Some(destination.counter + 1),
                index: Some(DEBIT_LEG),
                delta: Some(-transfer.amount),
                hash: Some(transfer.hash.clone()),
                counterpart: Some(transfer.destination.clone()),
            },
            previous: Some(source.key.clone()),
            timestamp: Some(timestamp),
        };
        let credit = AddressTransaction {
            count: destination.counter + 1,
            address: transfer.destination.clone(),
            balance: balances.destination,
            currency: balances.currency,
            limits: destination.record.limits.clone(),
            transaction: LegMetadata {
                count: Some(source.counter + 1),
                index: Some(CREDIT_LEG),
                delta: Some(transfer.amount),
                hash: Some(transfer.hash.clone()),
                counterpart: Some(transfer.source.clone()),
            },
            previous: Some(destination.key.clone()),
            timestamp: Some(timestamp),
        };

        let observed =
            storage::read_counter(self.store.as_ref(), &keys::account_counter(&transfer.destination))
                .await?;
        if observed != destination.counter {
            tracing::warn!(
                address = %transfer.destination,
                read = destination.counter,
                observed,
                "destination advanced before settlement"
            );
            return Err(LedgerError::RaceConditionFound(transfer.destination.clone()));
        }

        let source_count = self.commit_leg(&source, &debit).await?;
        let destination_count = match self.commit_leg(&destination, &credit).await {
            Ok(count) => count,
            Err(cause) => {
                tracing::warn!(
                    hash = %transfer.hash,
                    committed = %transfer.source,
                    error = %cause,
                    "transfer partially settled"
                );
                return Err(LedgerError::PartiallySettled {
                    committed: transfer.source.clone(),
                    cause: Box::new(cause),
                });
            }
        };

        tracing::info!(
            hash = %transfer.hash,
            source = %transfer.source,
            destination = %transfer.destination,
            amount = %transfer.amount,
            "transfer cleared"
        );
        Ok(TransferReceipt {
            status: TransferStatus::Cleared,
            hash: transfer.hash.clone(),
            source_count,
            destination_count,
        })
    }

    /// Append `record` after `head` and advance the account counter.
    ///
    /// Returns the new counter value.
    async fn commit_leg(&self, head: &ChainHead, record: &AddressTransaction) -> LedgerResult<u64> {
        let address = &record.address;
        let sealed = Envelope::seal_typed(record, self.config.default_digest)
            .map_err(|e| LedgerError::Store(StoreError::Serialization(e.to_string())))?;
        let key = keys::account_record(address, head.counter + 1);

        storage::create_json(self.store.as_ref(), &key, &sealed)
            .await
            .map_err(|e| match e {
                StoreError::KeyAlreadyExists(_) => {
                    tracing::warn!(address = %address, position = head.counter + 1, "lost record race");
                    LedgerError::RaceConditionFound(address.clone())
                }
                other => other.into(),
            })?;

        let observed = storage::increment(self.store.as_ref(), &keys::account_counter(address)).await?;
        if observed.saturating_sub(head.counter) > 1 {
            tracing::warn!(
                address = %address,
                read = head.counter,
                observed,
                "counter advanced concurrently"
            );
            return Err(LedgerError::RaceConditionFound(address.clone()));
        }
        Ok(observed)
    }
}
