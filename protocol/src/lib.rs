// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tally — Ledger Core
//!
//! A small programmable ledger: cryptographically addressed accounts,
//! currencies minted against an issuing account, and transfers cleared with
//! signature authorization, balance limits and a linear history per account.
//!
//! Tally doesn't own a database. It sits on any key-value store that can
//! create-if-absent and increment atomically, and turns those two primitives
//! into a ledger with audit-chain integrity and race-free balance updates.
//!
//! ## Architecture
//!
//! - **config** — Address prefixes, digest allow-list, scheme registry.
//! - **crypto** — SHA-2, RIPEMD-160, Ed25519 and secp256k1 verification.
//! - **envelope** — Signed-message envelopes: hash and threshold checks.
//! - **identity** — Address derivation and decoding.
//! - **storage** — The store contract plus in-memory and sled backends.
//! - **ledger** — Address, currency and transaction services.
//! - **error** — The error taxonomy clients see.
//!
//! ## Design Philosophy
//!
//! 1. Validate everything before writing anything (the IOU is the one
//!    deliberate exception: it *is* the replay guard).
//! 2. Money is a `Decimal`. Never a float.
//! 3. History is append-only. Counters only move forward, by one.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod storage;

pub use config::LedgerConfig;
pub use envelope::Envelope;
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
