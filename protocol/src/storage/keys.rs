//! # Keying Scheme
//!
//! Every document the ledger writes lives under one of these keys. The
//! segments are joined with `::`, which never appears in a Base58 address,
//! a currency code, or a hex hash, so keys can't collide across kinds.
//!
//! | Document                         | Key                                        |
//! |----------------------------------|--------------------------------------------|
//! | global currency sequence counter | `counter::currency`                        |
//! | account record                   | `address::{address}`                       |
//! | account transaction counter      | `address::{address}::transaction`          |
//! | account transaction record       | `address::{address}::transaction::{count}` |
//! | currency sequence lookup         | `currency::lookup::{sequence}`             |
//! | currency address counter         | `currency::{code}::address`                |
//! | currency address lookup          | `currency::{code}::address::{sequence}`    |
//! | currency request counter         | `currency::{code}::request`                |
//! | currency transaction counter     | `currency::{code}::transaction`            |
//! | currency transaction record      | `currency::{code}::transaction::{count}`   |
//! | transfer request (IOU)           | `iou::{hash}`                              |

const SEP: &str = "::";

/// Global currency sequence counter.
pub const CURRENCY_COUNTER: &str = "counter::currency";

pub fn account(address: &str) -> String {
    format!("address{SEP}{address}")
}

pub fn account_counter(address: &str) -> String {
    format!("address{SEP}{address}{SEP}transaction")
}

/// Record key for position `count` on a chain whose counter lives at
/// `counter_key`.
pub fn record(counter_key: &str, count: u64) -> String {
    format!("{counter_key}{SEP}{count}")
}

pub fn account_record(address: &str, count: u64) -> String {
    record(&account_counter(address), count)
}

pub fn currency_lookup(sequence: u64) -> String {
    format!("currency{SEP}lookup{SEP}{sequence}")
}

pub fn currency_address_counter(code: &str) -> String {
    format!("currency{SEP}{code}{SEP}address")
}

pub fn currency_address_lookup(code: &str, sequence: u64) -> String {
    record(&currency_address_counter(code), sequence)
}

pub fn currency_request_counter(code: &str) -> String {
    format!("currency{SEP}{code}{SEP}request")
}

pub fn currency_counter(code: &str) -> String {
    format!("currency{SEP}{code}{SEP}transaction")
}

pub fn currency_record(code: &str, count: u64) -> String {
    record(&currency_counter(code), count)
}

pub fn iou(hash: &str) -> String {
    format!("iou{SEP}{hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_keys_nest_under_the_address() {
        assert_eq!(account("wX"), "address::wX");
        assert_eq!(account_counter("wX"), "address::wX::transaction");
        assert_eq!(account_record("wX", 3), "address::wX::transaction::3");
    }

    #[test]
    fn currency_keys() {
        assert_eq!(currency_lookup(1), "currency::lookup::1");
        assert_eq!(currency_address_lookup("ABC", 1), "currency::ABC::address::1");
        assert_eq!(currency_request_counter("ABC"), "currency::ABC::request");
        assert_eq!(currency_record("ABC", 0), "currency::ABC::transaction::0");
    }

    #[test]
    fn iou_key() {
        assert_eq!(iou("ab12"), "iou::ab12");
    }
}
