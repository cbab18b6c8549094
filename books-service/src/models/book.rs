//! Book model for books-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Client a book is billed to. Determines which surcharge and lifecycle
/// rules apply: Deep Blue tracks one running balance with partial payments,
/// Galakiwi groups charges into guides with an optional 10% surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Client {
    DeepBlue,
    Galakiwi,
}

impl Client {
    pub fn as_str(&self) -> &'static str {
        match self {
            Client::DeepBlue => "deep_blue",
            Client::Galakiwi => "galakiwi",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "galakiwi" => Client::Galakiwi,
            _ => Client::DeepBlue,
        }
    }
}

/// Book lifecycle status. `Closed` and `Paid` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Open,
    Closed,
    Paid,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Open => "open",
            BookStatus::Closed => "closed",
            BookStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "closed" => BookStatus::Closed,
            "paid" => BookStatus::Paid,
            _ => BookStatus::Open,
        }
    }
}

/// One billing cycle for a client. A book with a non-null `parent_id` is a
/// guide (Galakiwi sub-ledger); guides never nest further.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub book_id: Uuid,
    pub client: String,
    pub parent_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub name: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl Book {
    pub fn is_open(&self) -> bool {
        BookStatus::from_string(&self.status) == BookStatus::Open
    }
}

/// Input for creating a book (or a guide, when `parent_id` is set).
#[derive(Debug, Clone)]
pub struct CreateBook {
    pub client: Client,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub invoice_number: Option<String>,
}
