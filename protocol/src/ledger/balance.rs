//! Balance arithmetic for a single transfer.
//!
//! Exact decimal math only. A transfer debits the source and credits the
//! destination by the same amount, so the sum of the two balances is
//! unchanged by construction; the checks here decide whether the move is
//! allowed at all.

use rust_decimal::Decimal;

use super::records::AddressTransaction;
use crate::error::{LedgerError, LedgerResult};

/// New balances for both sides of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balances {
    pub source: Decimal,
    pub destination: Decimal,
    /// Currency the destination holds after the transfer.
    pub currency: Option<String>,
}

/// Apply `amount` to the latest records of both accounts.
///
/// Checks run in a fixed order: currency compatibility, the source's lower
/// limit, the destination's upper limit, and finally that both balances
/// actually moved.
pub fn compute_balances(
    source: &AddressTransaction,
    destination: &AddressTransaction,
    amount: Decimal,
) -> LedgerResult<Balances> {
    let new_source = source.balance.checked_sub(amount).ok_or_else(|| {
        LedgerError::BalanceComputationFailed(format!("debit overflow on {}", source.address))
    })?;
    let new_destination = destination.balance.checked_add(amount).ok_or_else(|| {
        LedgerError::BalanceComputationFailed(format!(
            "credit overflow on {}",
            destination.address
        ))
    })?;

    // A destination without a currency adopts the source's on first receipt.
    let currency = match (&source.currency, &destination.currency) {
        (src, None) => src.clone(),
        (src, Some(dst)) if src.as_deref() == Some(dst.as_str()) => Some(dst.clone()),
        (src, Some(dst)) => {
            return Err(LedgerError::CurrencyMismatch {
                expected: dst.clone(),
                found: src.clone().unwrap_or_default(),
            })
        }
    };

    if let Some(lower) = source.limits.lower {
        if new_source < lower {
            return Err(LedgerError::UnavailableFunds(source.address.clone()));
        }
    }
    if let Some(upper) = destination.limits.upper {
        if new_destination > upper {
            return Err(LedgerError::UnreceivableFunds(destination.address.clone()));
        }
    }

    if new_source == source.balance || new_destination == destination.balance {
        return Err(LedgerError::BalanceComputationFailed(
            "transfer leaves balances unchanged".into(),
        ));
    }

    Ok(Balances {
        source: new_source,
        destination: new_destination,
        currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AddressClass;
    use crate::ledger::records::Limits;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn record(address: &str, balance: &str, currency: Option<&str>, limits: Limits) -> AddressTransaction {
        let mut r = AddressTransaction::genesis(address, AddressClass::Bearer, None, 0);
        r.balance = dec(balance);
        r.currency = currency.map(str::to_string);
        r.limits = limits;
        r
    }

    #[test]
    fn balance_is_conserved_exactly() {
        let src = record("wA", "100.00", Some("CUR"), Limits::bearer());
        let dst = record("wB", "0", Some("CUR"), Limits::bearer());
        let out = compute_balances(&src, &dst, dec("12.34")).unwrap();
        assert_eq!(out.source.to_string(), "87.66");
        assert_eq!(out.destination.to_string(), "12.34");
        assert_eq!(out.source + out.destination, src.balance + dst.balance);
    }

    #[test]
    fn upper_limit_enforced() {
        let issuer = record("cI", "-1000", Some("CUR"), Limits::issuer());
        let capped = Limits {
            lower: Some(dec("0")),
            upper: Some(dec("500")),
        };
        let dst = record("wB", "490", Some("CUR"), capped);

        assert_eq!(
            compute_balances(&issuer, &dst, dec("20")).unwrap_err().code(),
            "unreceivable-funds"
        );
        let ok = compute_balances(&issuer, &dst, dec("10")).unwrap();
        assert_eq!(ok.destination, dec("500"));
    }

    #[test]
    fn lower_limit_enforced() {
        let src = record("wA", "5", Some("CUR"), Limits::bearer());
        let dst = record("wB", "0", Some("CUR"), Limits::bearer());
        assert_eq!(
            compute_balances(&src, &dst, dec("5.01")).unwrap_err().code(),
            "unavailable-funds"
        );
        assert!(compute_balances(&src, &dst, dec("5")).is_ok());
    }

    #[test]
    fn issuer_can_mint_below_zero() {
        let issuer = record("cI", "0", Some("CUR"), Limits::issuer());
        let dst = record("wB", "0", None, Limits::bearer());
        let out = compute_balances(&issuer, &dst, dec("250")).unwrap();
        assert_eq!(out.source, dec("-250"));
        assert_eq!(out.currency.as_deref(), Some("CUR"));
    }

    #[test]
    fn issuer_cannot_receive_above_zero() {
        let bearer = record("wA", "10", Some("CUR"), Limits::bearer());
        let issuer = record("cI", "0", Some("CUR"), Limits::issuer());
        assert_eq!(
            compute_balances(&bearer, &issuer, dec("1")).unwrap_err().code(),
            "unreceivable-funds"
        );
    }

    #[test]
    fn currency_mismatch_rejected() {
        let src = record("wA", "10", Some("AAA"), Limits::bearer());
        let dst = record("wB", "0", Some("BBB"), Limits::bearer());
        assert_eq!(
            compute_balances(&src, &dst, dec("1")).unwrap_err().code(),
            "currency-mismatch"
        );
    }

    #[test]
    fn zero_amount_leaves_balances_unchanged() {
        let src = record("wA", "10", Some("CUR"), Limits::bearer());
        let dst = record("wB", "0", Some("CUR"), Limits::bearer());
        assert_eq!(
            compute_balances(&src, &dst, dec("0")).unwrap_err().code(),
            "balance-computation-failed"
        );
    }

    #[test]
    fn overflow_is_an_error() {
        let src = record("cI", "0", Some("CUR"), Limits::issuer());
        let dst = record("wB", &Decimal::MAX.to_string(), Some("CUR"), Limits::bearer());
        assert_eq!(
            compute_balances(&src, &dst, dec("1")).unwrap_err().code(),
            "balance-computation-failed"
        );
    }
}
