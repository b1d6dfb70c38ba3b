//! Shared helpers for the ledger integration tests: wallets that sign like
//! real clients, and store wrappers that perturb scheduling or inject faults.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ed25519_dalek::Signer as _;
use k256::ecdsa::signature::Signer as _;
use rand::rngs::OsRng;
use serde_json::{json, Value};

use tally_protocol::config::LedgerConfig;
use tally_protocol::crypto::DigestAlgorithm;
use tally_protocol::envelope::{Envelope, SignatureEntry, SignatureHeader};
use tally_protocol::identity::{derive_address, AddressClass};
use tally_protocol::storage::{LedgerStore, MemoryStore, StoreError, StoreResult, UpdateMode};
use tally_protocol::Ledger;

// ---------------------------------------------------------------------------
// Keys & Wallets
// ---------------------------------------------------------------------------

pub enum Key {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl Key {
    pub fn ed25519() -> Self {
        Key::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    pub fn secp256k1() -> Self {
        Key::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng))
    }

    pub fn alg(&self) -> &'static str {
        match self {
            Key::Ed25519(_) => "ed25519",
            Key::Secp256k1(_) => "secp256k1",
        }
    }

    pub fn public_hex(&self) -> String {
        match self {
            Key::Ed25519(k) => hex::encode(k.verifying_key().as_bytes()),
            Key::Secp256k1(k) => hex::encode(k.verifying_key().to_sec1_bytes()),
        }
    }

    pub fn sign_hex(&self, digest: &[u8]) -> String {
        match self {
            Key::Ed25519(k) => hex::encode(k.sign(digest).to_bytes()),
            Key::Secp256k1(k) => {
                let sig: k256::ecdsa::Signature = k.sign(digest);
                hex::encode(sig.to_bytes())
            }
        }
    }
}

pub struct Wallet {
    pub keys: Vec<Key>,
    pub address: String,
}

impl Wallet {
    pub fn new(keys: Vec<Key>, class: AddressClass) -> Self {
        let primary = hex::decode(keys[0].public_hex()).unwrap();
        let address = derive_address(&primary, class, &LedgerConfig::default());
        Self { keys, address }
    }

    pub fn bearer() -> Self {
        Self::new(vec![Key::ed25519()], AddressClass::Bearer)
    }

    pub fn issuer() -> Self {
        Self::new(vec![Key::ed25519()], AddressClass::Issuer)
    }

    pub fn multi(n: usize) -> Self {
        Self::new((0..n).map(|_| Key::ed25519()).collect(), AddressClass::Bearer)
    }

    pub fn public_keys(&self) -> Vec<String> {
        self.keys.iter().map(Key::public_hex).collect()
    }

    /// `kid` a transfer signature from key `index` must carry.
    pub fn kid(&self, index: usize) -> String {
        if self.keys.len() == 1 {
            self.address.clone()
        } else {
            format!("{}:{}", self.address, index)
        }
    }

    /// Account-creation envelope signed by every key, in key order.
    pub fn account_envelope(&self, threshold: usize) -> Envelope {
        let payload = json!({
            "address": self.address,
            "keys": self.public_keys(),
            "threshold": threshold,
        });
        let mut envelope = Envelope::seal(payload, DigestAlgorithm::Sha256);
        for index in 0..self.keys.len() {
            let slot = self.signature(&envelope, index);
            envelope.signatures.push(slot.into());
        }
        envelope
    }

    /// Transfer envelope signed by the keys at `signers`.
    pub fn transfer(&self, to: &str, amt: &str, signers: &[usize]) -> Envelope {
        let payload = json!({"sub": self.address, "aud": to, "amt": amt});
        let mut envelope = Envelope::seal(payload, DigestAlgorithm::Sha256);
        for &index in signers {
            let slot = self.signature(&envelope, index);
            envelope.signatures.push(slot.into());
        }
        envelope
    }

    pub fn signature(&self, envelope: &Envelope, index: usize) -> SignatureEntry {
        let digest = envelope.digest_bytes().unwrap();
        let key = &self.keys[index];
        SignatureEntry {
            header: SignatureHeader {
                alg: key.alg().to_string(),
                kid: Some(self.kid(index)),
            },
            signature: key.sign_hex(&digest),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger Setup
// ---------------------------------------------------------------------------

pub async fn memory_ledger() -> Ledger<MemoryStore> {
    let ledger = Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
    ledger.initialize().await.unwrap();
    ledger
}

/// Create a bearer account on `ledger`.
pub async fn open_bearer<S: LedgerStore + ?Sized>(ledger: &Ledger<S>) -> Wallet {
    let wallet = Wallet::bearer();
    ledger
        .create_address(wallet.account_envelope(1))
        .await
        .unwrap();
    wallet
}

/// Issue a currency and fund `holder` with `amount` of it.
pub async fn issue_and_fund<S: LedgerStore + ?Sized>(
    ledger: &Ledger<S>,
    holder: &Wallet,
    amount: &str,
) -> Wallet {
    let issuer = Wallet::issuer();
    ledger
        .create_currency(issuer.account_envelope(1))
        .await
        .unwrap();
    ledger
        .request_transfer(issuer.transfer(&holder.address, amount, &[0]))
        .await
        .unwrap();
    issuer
}

// ---------------------------------------------------------------------------
// Store Wrappers
// ---------------------------------------------------------------------------

/// Yields to the scheduler before every store call, so concurrent requests
/// on a single-threaded runtime interleave at each I/O point.
#[derive(Default)]
pub struct YieldingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl LedgerStore for YieldingStore {
    async fn create(&self, key: &str, value: Value) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.inner.create(key, value).await
    }

    async fn read(&self, key: &str) -> StoreResult<Value> {
        tokio::task::yield_now().await;
        self.inner.read(key).await
    }

    async fn update(&self, key: &str, delta: u64, mode: UpdateMode) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        self.inner.update(key, delta, mode).await
    }
}

/// Fails every create whose key starts with the armed prefix.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_prefix: Mutex<Option<String>>,
}

impl FaultyStore {
    pub fn arm(&self, prefix: impl Into<String>) {
        *self.fail_prefix.lock().unwrap() = Some(prefix.into());
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn create(&self, key: &str, value: Value) -> StoreResult<()> {
        let armed = self
            .fail_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if armed {
            return Err(StoreError::Backend(format!("injected failure on {key}")));
        }
        self.inner.create(key, value).await
    }

    async fn read(&self, key: &str) -> StoreResult<Value> {
        self.inner.read(key).await
    }

    async fn update(&self, key: &str, delta: u64, mode: UpdateMode) -> StoreResult<u64> {
        self.inner.update(key, delta, mode).await
    }
}
