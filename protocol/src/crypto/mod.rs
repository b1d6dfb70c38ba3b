//! # Cryptographic Primitives for Tally
//!
//! Everything security-related in the ledger flows through here: the digest
//! that seals an envelope, the key hash inside every address, and the
//! signature check that authorizes every transfer.
//!
//! - **SHA-256 / SHA-512** for envelope digests.
//! - **RIPEMD-160** for address key hashes.
//! - **Ed25519** and **secp256k1 ECDSA** for signatures.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations. No hand-rolled curves, no clever shortcuts.

pub mod hash;
pub mod signatures;

pub use hash::{key_hash, ripemd160, sha256, DigestAlgorithm};
pub use signatures::{SignatureError, SignatureScheme};
