//! Money arithmetic and balance aggregation.
//!
//! Deep Blue books total the base amounts of their items; Galakiwi guides
//! total the post-surcharge final amounts. Both subtract the payment total
//! to get the pending balance. All functions are pure and total: empty
//! input yields zero.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Item, Payment};

/// Multiplier applied to an item's base amount when the surcharge flag is
/// set: a flat 10% markup.
fn surcharge_multiplier() -> Decimal {
    Decimal::ONE + Decimal::new(10, 2)
}

/// `amount * 1.10` when `applies`, otherwise `amount` unchanged. No
/// rounding happens here; rounding is a display concern.
pub fn apply_surcharge(amount: Decimal, applies: bool) -> Decimal {
    if applies {
        amount * surcharge_multiplier()
    } else {
        amount
    }
}

/// Sum of base amounts across items (Deep Blue "total services").
pub fn sum_base_amounts(items: &[Item]) -> Decimal {
    items.iter().map(|item| item.amount).sum()
}

/// Sum of post-surcharge final amounts across items (Galakiwi totals).
pub fn sum_final_amounts(items: &[Item]) -> Decimal {
    items.iter().map(Item::final_amount).sum()
}

/// Sum of payment amounts.
pub fn sum_payments(payments: &[Payment]) -> Decimal {
    payments.iter().map(|payment| payment.amount).sum()
}

/// Derived totals for one book or guide. `pending = charged - paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub charged: Decimal,
    pub paid: Decimal,
    pub pending: Decimal,
}

impl Balance {
    pub fn new(charged: Decimal, paid: Decimal) -> Self {
        Self {
            charged,
            paid,
            pending: charged - paid,
        }
    }

    /// Balance of a Deep Blue book: items count at their base amount.
    pub fn of_deep_blue(items: &[Item], payments: &[Payment]) -> Self {
        Self::new(sum_base_amounts(items), sum_payments(payments))
    }

    /// Balance of a Galakiwi guide: items count at their final amount.
    pub fn of_guide(items: &[Item], payments: &[Payment]) -> Self {
        Self::new(sum_final_amounts(items), sum_payments(payments))
    }

    /// Component-wise roll-up, used for a Galakiwi parent book whose
    /// totals are the sum over its guides.
    pub fn combined<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Balance>,
    {
        parts.into_iter().fold(
            Self::new(Decimal::ZERO, Decimal::ZERO),
            |acc, part| Self {
                charged: acc.charged + part.charged,
                paid: acc.paid + part.paid,
                pending: acc.pending + part.pending,
            },
        )
    }

    /// A book with `pending <= 0` is fully paid.
    pub fn is_settled(&self) -> bool {
        self.pending <= Decimal::ZERO
    }
}
