//! Item (billable line) model for books-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::balance::apply_surcharge;

/// One billable line within a book. Immutable once created; correcting an
/// item means deleting and re-adding it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub item_id: Uuid,
    pub book_id: Uuid,
    pub service_date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub surcharge: bool,
    pub carried_forward: bool,
    pub created_utc: DateTime<Utc>,
}

impl Item {
    /// Amount after the flat 10% surcharge, when the flag applies.
    /// Always derived from `amount`, never stored.
    pub fn final_amount(&self) -> Decimal {
        apply_surcharge(self.amount, self.surcharge)
    }
}

/// Input for adding an item to an open book.
#[derive(Debug, Clone)]
pub struct CreateItem {
    pub book_id: Uuid,
    pub service_date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub surcharge: bool,
    pub carried_forward: bool,
}
