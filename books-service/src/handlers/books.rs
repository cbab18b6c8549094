//! Book handlers: listing, creation, detail, deletion and the close
//! operation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::domain::balance::Balance;
use crate::dtos::{
    BookDetailResponse, CloseBookRequest, CloseBookResponse, CreateBookRequest, GuideDetail,
    ListBooksQuery,
};
use crate::models::{Book, Client, CreateBook};
use crate::services::metrics::BOOKS_TOTAL;
use crate::AppState;

/// List top-level books for a client, newest first.
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<Book>>, AppError> {
    let books = state.db.list_books(query.client).await?;
    Ok(Json(books))
}

/// Create a new open book, or a guide when `parent_id` is given.
pub async fn create_book(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    payload.validate()?;

    let input = CreateBook {
        client: payload.client,
        parent_id: payload.parent_id,
        name: payload.name.trim().to_string(),
        invoice_number: payload.invoice_number,
    };
    let book = state.db.create_book(&input).await?;

    BOOKS_TOTAL
        .with_label_values(&[&book.client, &book.status])
        .inc();

    Ok((StatusCode::CREATED, Json(book)))
}

/// Book detail with items, payments, derived balance and, for a Galakiwi
/// parent, its guides.
pub async fn get_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookDetailResponse>, AppError> {
    let book = state
        .db
        .get_book(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;

    let items = state.db.get_items(book_id).await?;
    let payments = state.db.get_payments(book_id).await?;

    let is_galakiwi = Client::from_string(&book.client) == Client::Galakiwi;
    let is_parent = book.parent_id.is_none();

    let mut guides = Vec::new();
    if is_galakiwi && is_parent {
        for guide in state.db.list_guides(book_id).await? {
            let guide_items = state.db.get_items(guide.book_id).await?;
            let guide_payments = state.db.get_payments(guide.book_id).await?;
            let balance = Balance::of_guide(&guide_items, &guide_payments);
            guides.push(GuideDetail {
                book: guide,
                items: guide_items,
                payments: guide_payments,
                balance,
            });
        }
    }

    let balance = if is_galakiwi && is_parent {
        Balance::combined(guides.iter().map(|guide| guide.balance))
    } else if is_galakiwi {
        Balance::of_guide(&items, &payments)
    } else {
        Balance::of_deep_blue(&items, &payments)
    };

    Ok(Json(BookDetailResponse {
        book,
        items,
        payments,
        balance,
        guides,
    }))
}

/// Delete a book and, through the cascade, everything it owns.
pub async fn delete_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_book(book_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Book not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Close a Deep Blue book with a final payment, possibly spawning a
/// successor book that carries the unpaid remainder.
pub async fn close_book(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<CloseBookRequest>,
) -> Result<Json<CloseBookResponse>, AppError> {
    let (book, successor) = state
        .db
        .close_book(book_id, payload.amount, payload.method.as_str(), payload.note)
        .await?;

    BOOKS_TOTAL
        .with_label_values(&[&book.client, &book.status])
        .inc();

    Ok(Json(CloseBookResponse { book, successor }))
}
