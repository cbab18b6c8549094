//! Request and response types for the REST surface.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::balance::Balance;
use crate::models::{Book, Client, Item, Payment, PaymentMethod};

/// Required text fields are stored trimmed, so whitespace-only input is as
/// empty as the empty string.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListBooksQuery {
    pub client: Client,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookRequest {
    pub client: Client,
    #[validate(custom(function = not_blank, message = "name must not be empty"))]
    pub name: String,
    pub invoice_number: Option<String>,
    /// Set to create a guide under a Galakiwi parent book.
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemRequest {
    pub service_date: Option<NaiveDate>,
    #[validate(custom(function = not_blank, message = "description must not be empty"))]
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub surcharge: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CloseBookRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub note: Option<String>,
}

/// A guide with its charges, payments and derived balance.
#[derive(Debug, Serialize)]
pub struct GuideDetail {
    pub book: Book,
    pub items: Vec<Item>,
    pub payments: Vec<Payment>,
    pub balance: Balance,
}

/// Full view of one book. For a Galakiwi parent the balance is the roll-up
/// over its guides; otherwise it is derived from the book's own items and
/// payments.
#[derive(Debug, Serialize)]
pub struct BookDetailResponse {
    pub book: Book,
    pub items: Vec<Item>,
    pub payments: Vec<Payment>,
    pub balance: Balance,
    pub guides: Vec<GuideDetail>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment: Payment,
    /// The owning book after the payment, since recording one may flip the
    /// status to paid.
    pub book: Book,
}

#[derive(Debug, Serialize)]
pub struct CloseBookResponse {
    pub book: Book,
    pub successor: Option<Book>,
}
