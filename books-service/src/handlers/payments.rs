//! Payment handlers. A payment may never exceed the pending balance; the
//! repository validates that under a row lock.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CreatePaymentRequest, PaymentResponse};
use crate::models::CreatePayment;
use crate::services::metrics::PAYMENTS_TOTAL;
use crate::AppState;

/// Record a payment against an open book. Settling the balance flips the
/// book to paid.
pub async fn add_payment(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let input = CreatePayment {
        book_id,
        paid_on: payload.paid_on,
        amount: payload.amount,
        method: payload.method,
        note: payload.note,
    };
    let (payment, book) = state.db.add_payment(&input).await?;

    PAYMENTS_TOTAL.with_label_values(&[&payment.method]).inc();

    Ok((StatusCode::CREATED, Json(PaymentResponse { payment, book })))
}

/// Remove a payment from an open book.
pub async fn remove_payment(
    State(state): State<AppState>,
    Path((book_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let removed = state.db.remove_payment(book_id, payment_id).await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Payment not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
