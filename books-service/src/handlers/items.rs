//! Item handlers. Items are immutable: add and remove only, while the
//! owning book is open.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::CreateItemRequest;
use crate::models::{CreateItem, Item};
use crate::AppState;

/// Add a billable line to an open book.
pub async fn add_item(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    payload.validate()?;
    if payload.amount < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Item amount must not be negative"
        )));
    }

    let input = CreateItem {
        book_id,
        service_date: payload.service_date,
        description: payload.description.trim().to_string(),
        amount: payload.amount,
        surcharge: payload.surcharge,
        carried_forward: false,
    };
    let item = state.db.add_item(&input).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove an item from an open book.
pub async fn remove_item(
    State(state): State<AppState>,
    Path((book_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let removed = state.db.remove_item(book_id, item_id).await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
