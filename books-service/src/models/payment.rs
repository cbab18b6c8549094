//! Payment model for books-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a payment was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Cash,
    Check,
    Deposit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::Deposit => "deposit",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "cash" => PaymentMethod::Cash,
            "check" => PaymentMethod::Check,
            "deposit" => PaymentMethod::Deposit,
            _ => PaymentMethod::Transfer,
        }
    }
}

/// One amount received against a book's pending balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub book_id: Uuid,
    pub paid_on: NaiveDate,
    pub amount: Decimal,
    pub method: String,
    pub note: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment against an open book.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub book_id: Uuid,
    pub paid_on: Option<NaiveDate>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
}
