//! # Identity Module
//!
//! Ledger addresses. Every account is identified by a Base58Check string
//! derived from its primary public key:
//!
//! ```text
//! public_key
//!     -> DIGEST(public_key)          (sha256 by default)
//!     -> RIPEMD160(...)              20 bytes
//!     -> prefix byte || hash         0x57 issuer, 0x87 bearer
//!     -> Base58Check                 c... / w...
//! ```
//!
//! The first character tells you the class at a glance, which is also how the
//! services tell them apart: addresses beginning with `c` are issuers, the
//! rest are bearers.

pub mod address;

pub use address::{
    currency_code, decode_address, derive_address, AddressClass, AddressError, DecodedAddress,
};
