//! Book lifecycle: the open → closed/paid transitions and the Deep Blue
//! carry-forward close.
//!
//! Closing an open book takes a final payment amount `c` with
//! `0 <= c <= pending`. When a remainder stays unpaid the book closes and a
//! successor book is opened carrying the remainder as its single seed item;
//! otherwise the book is simply marked paid. The decision is made here as a
//! pure function; the repository executes the resulting writes in one
//! transaction.

use rust_decimal::Decimal;
use thiserror::Error;

/// Suffix appended to the source book's name for the successor book.
pub const CARRYOVER_SUFFIX: &str = " - Carried balance";

/// Note recorded on the closing payment when the caller gives none.
pub const CLOSING_PAYMENT_NOTE: &str = "Closing payment";

/// Name for the successor book spawned by a carry-forward close.
pub fn successor_name(source_name: &str) -> String {
    format!("{}{}", source_name, CARRYOVER_SUFFIX)
}

/// Description of the seed item holding the carried-forward remainder.
pub fn carryover_description(source_name: &str) -> String {
    format!("Carried-forward balance from {}", source_name)
}

/// How a close resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Fully settled; the book becomes `paid`.
    Settled,
    /// A remainder stays unpaid; the book becomes `closed` and a successor
    /// book carries the remainder.
    CarryForward { remainder: Decimal },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CloseError {
    #[error("closing amount {amount} exceeds pending balance {pending}")]
    ExceedsPending { amount: Decimal, pending: Decimal },
    #[error("closing amount must not be negative")]
    NegativeAmount,
}

/// Decide how closing a book with the given pending balance and closing
/// payment `amount` resolves. Performs no writes.
pub fn plan_close(pending: Decimal, amount: Decimal) -> Result<CloseOutcome, CloseError> {
    if amount < Decimal::ZERO {
        return Err(CloseError::NegativeAmount);
    }
    if amount > pending {
        return Err(CloseError::ExceedsPending { amount, pending });
    }

    let remainder = pending - amount;
    if remainder > Decimal::ZERO {
        Ok(CloseOutcome::CarryForward { remainder })
    } else {
        Ok(CloseOutcome::Settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payment_carries_remainder_forward() {
        // charged 100, paid 30 -> pending 70; closing with 40 leaves 30
        let outcome = plan_close(Decimal::new(70, 0), Decimal::new(40, 0)).unwrap();
        assert_eq!(
            outcome,
            CloseOutcome::CarryForward {
                remainder: Decimal::new(30, 0)
            }
        );
    }

    #[test]
    fn full_payment_settles_without_successor() {
        let outcome = plan_close(Decimal::new(70, 0), Decimal::new(70, 0)).unwrap();
        assert_eq!(outcome, CloseOutcome::Settled);
    }

    #[test]
    fn zero_payment_carries_whole_balance() {
        let outcome = plan_close(Decimal::new(70, 0), Decimal::ZERO).unwrap();
        assert_eq!(
            outcome,
            CloseOutcome::CarryForward {
                remainder: Decimal::new(70, 0)
            }
        );
    }

    #[test]
    fn overpayment_is_rejected() {
        let err = plan_close(Decimal::new(70, 0), Decimal::new(71, 0)).unwrap_err();
        assert_eq!(
            err,
            CloseError::ExceedsPending {
                amount: Decimal::new(71, 0),
                pending: Decimal::new(70, 0)
            }
        );
    }

    #[test]
    fn negative_payment_is_rejected() {
        let err = plan_close(Decimal::new(70, 0), Decimal::new(-1, 0)).unwrap_err();
        assert_eq!(err, CloseError::NegativeAmount);
    }

    #[test]
    fn closing_an_already_settled_book_settles() {
        let outcome = plan_close(Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(outcome, CloseOutcome::Settled);
    }

    #[test]
    fn successor_naming_keeps_source_name() {
        assert_eq!(
            successor_name("March charter"),
            "March charter - Carried balance"
        );
        assert_eq!(
            carryover_description("March charter"),
            "Carried-forward balance from March charter"
        );
    }
}
