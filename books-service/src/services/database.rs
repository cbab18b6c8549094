//! Database service for books-service.
//!
//! All balance checks and multi-write transitions (payment insertion, the
//! carry-forward close) run inside a transaction holding a `FOR UPDATE`
//! lock on the book row, so a stale pending balance can never be committed
//! against and a failed close leaves no partial writes behind.

use crate::domain::balance::Balance;
use crate::domain::lifecycle::{
    carryover_description, plan_close, successor_name, CloseOutcome, CLOSING_PAYMENT_NOTE,
};
use crate::models::{
    Book, BookStatus, Client, CreateBook, CreateItem, CreatePayment, Item, Payment,
};
use crate::services::metrics::DB_QUERY_DURATION;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const BOOK_COLUMNS: &str =
    "book_id, client, parent_id, invoice_number, name, status, created_utc";
const ITEM_COLUMNS: &str =
    "item_id, book_id, service_date, description, amount, surcharge, carried_forward, created_utc";
const PAYMENT_COLUMNS: &str =
    "payment_id, book_id, paid_on, amount, method, note, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "books-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Book Operations
    // -------------------------------------------------------------------------

    /// Create a new open book, or a guide when `parent_id` is set.
    ///
    /// The "at most one open Deep Blue top-level book" rule is enforced by a
    /// partial unique index; a violation surfaces as a conflict.
    #[instrument(skip(self, input), fields(client = input.client.as_str()))]
    pub async fn create_book(&self, input: &CreateBook) -> Result<Book, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_book"])
            .start_timer();

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .get_book(parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Parent book not found")))?;
            if Client::from_string(&parent.client) != Client::Galakiwi
                || input.client != Client::Galakiwi
            {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Guides can only be created under Galakiwi books"
                )));
            }
            if parent.parent_id.is_some() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Guides cannot be nested under other guides"
                )));
            }
        }

        let book_id = Uuid::new_v4();
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (book_id, client, parent_id, invoice_number, name, status)
            VALUES ($1, $2, $3, $4, $5, 'open')
            RETURNING {BOOK_COLUMNS}
            "#,
        ))
        .bind(book_id)
        .bind(input.client.as_str())
        .bind(input.parent_id)
        .bind(&input.invoice_number)
        .bind(&input.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A Deep Blue book is already open; close it before creating a new one"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create book: {}", e)),
        })?;

        timer.observe_duration();

        info!(book_id = %book.book_id, name = %book.name, "Book created");

        Ok(book)
    }

    /// Get a book by ID.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_book(&self, book_id: Uuid) -> Result<Option<Book>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_book"])
            .start_timer();

        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE book_id = $1"
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get book: {}", e)))?;

        timer.observe_duration();

        Ok(book)
    }

    /// List top-level books for a client, newest first.
    #[instrument(skip(self), fields(client = client.as_str()))]
    pub async fn list_books(&self, client: Client) -> Result<Vec<Book>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_books"])
            .start_timer();

        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE client = $1 AND parent_id IS NULL
            ORDER BY created_utc DESC
            "#,
        ))
        .bind(client.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list books: {}", e)))?;

        timer.observe_duration();

        Ok(books)
    }

    /// List the guides under a parent book, by name.
    #[instrument(skip(self), fields(parent_id = %parent_id))]
    pub async fn list_guides(&self, parent_id: Uuid) -> Result<Vec<Book>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_guides"])
            .start_timer();

        let guides = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE parent_id = $1
            ORDER BY name
            "#,
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list guides: {}", e)))?;

        timer.observe_duration();

        Ok(guides)
    }

    /// Delete a book. Items, payments and guides go with it (FK cascade).
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn delete_book(&self, book_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_book"])
            .start_timer();

        let result = sqlx::query("DELETE FROM books WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete book: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(book_id = %book_id, "Book deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Item Operations
    // -------------------------------------------------------------------------

    /// Add an item to an open book.
    #[instrument(skip(self, input), fields(book_id = %input.book_id))]
    pub async fn add_item(&self, input: &CreateItem) -> Result<Item, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_item"])
            .start_timer();

        let book = self
            .get_book(input.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;
        if !book.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Items can only be added to open books"
            )));
        }
        if Client::from_string(&book.client) == Client::Galakiwi && book.parent_id.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Galakiwi charges belong to a guide, not the parent book"
            )));
        }

        // The surcharge flag is meaningful only for Galakiwi charges.
        let surcharge = input.surcharge && Client::from_string(&book.client) == Client::Galakiwi;

        let item_id = Uuid::new_v4();
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (item_id, book_id, service_date, description, amount, surcharge, carried_forward)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(item_id)
        .bind(input.book_id)
        .bind(input.service_date)
        .bind(&input.description)
        .bind(input.amount)
        .bind(surcharge)
        .bind(input.carried_forward)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add item: {}", e)))?;

        timer.observe_duration();

        info!(item_id = %item.item_id, amount = %item.amount, "Item added");

        Ok(item)
    }

    /// Get the items of a book, oldest service date first.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_items(&self, book_id: Uuid) -> Result<Vec<Item>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_items"])
            .start_timer();

        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE book_id = $1
            ORDER BY service_date, created_utc
            "#,
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Remove an item from an open book.
    #[instrument(skip(self), fields(book_id = %book_id, item_id = %item_id))]
    pub async fn remove_item(&self, book_id: Uuid, item_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_item"])
            .start_timer();

        let book = self
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;
        if !book.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Items can only be removed from open books"
            )));
        }

        let result = sqlx::query("DELETE FROM items WHERE book_id = $1 AND item_id = $2")
            .bind(book_id)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to remove item: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment against an open book.
    ///
    /// Runs in a transaction with the book row locked: the pending balance
    /// is recomputed under the lock, the payment may not exceed it, and the
    /// book flips to `paid` when the balance reaches zero.
    #[instrument(skip(self, input), fields(book_id = %input.book_id))]
    pub async fn add_payment(&self, input: &CreatePayment) -> Result<(Payment, Book), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = self.begin().await?;

        let book = lock_book(&mut tx, input.book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;
        if !book.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payments can only be recorded against open books"
            )));
        }
        if Client::from_string(&book.client) == Client::Galakiwi && book.parent_id.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Galakiwi payments are recorded against a guide, not the parent book"
            )));
        }

        let balance = balance_in_tx(&mut tx, input.book_id).await?;
        if balance.is_settled() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Book is already fully paid"
            )));
        }
        if input.amount > balance.pending {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount {} exceeds pending balance {}",
                input.amount,
                balance.pending
            )));
        }

        let payment = insert_payment(
            &mut tx,
            input.book_id,
            input.paid_on,
            input.amount,
            input.method.as_str(),
            input.note.as_deref(),
        )
        .await?;

        let book = if input.amount >= balance.pending {
            set_status(&mut tx, input.book_id, BookStatus::Paid).await?
        } else {
            book
        };

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            status = %book.status,
            "Payment recorded"
        );

        Ok((payment, book))
    }

    /// Get the payments of a book, oldest first.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_payments(&self, book_id: Uuid) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE book_id = $1
            ORDER BY paid_on, created_utc
            "#,
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Remove a payment from an open book.
    #[instrument(skip(self), fields(book_id = %book_id, payment_id = %payment_id))]
    pub async fn remove_payment(&self, book_id: Uuid, payment_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_payment"])
            .start_timer();

        let book = self
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;
        if !book.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payments can only be removed from open books"
            )));
        }

        let result = sqlx::query("DELETE FROM payments WHERE book_id = $1 AND payment_id = $2")
            .bind(book_id)
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to remove payment: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Lifecycle Operations
    // -------------------------------------------------------------------------

    /// Close a Deep Blue book with a final payment, carrying any remainder
    /// forward into a freshly opened successor book.
    ///
    /// The closing payment, the successor book, its seed item and the status
    /// update commit together or not at all.
    #[instrument(skip(self, note), fields(book_id = %book_id, amount = %amount))]
    pub async fn close_book(
        &self,
        book_id: Uuid,
        amount: Decimal,
        method: &str,
        note: Option<String>,
    ) -> Result<(Book, Option<Book>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["close_book"])
            .start_timer();

        let mut tx = self.begin().await?;

        let book = lock_book(&mut tx, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Book not found")))?;
        if Client::from_string(&book.client) != Client::DeepBlue || book.parent_id.is_some() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only Deep Blue top-level books can be closed"
            )));
        }
        if !book.is_open() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only open books can be closed"
            )));
        }

        let balance = balance_in_tx(&mut tx, book_id).await?;
        let outcome = plan_close(balance.pending, amount)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

        if amount > Decimal::ZERO {
            let note = note.unwrap_or_else(|| CLOSING_PAYMENT_NOTE.to_string());
            insert_payment(&mut tx, book_id, None, amount, method, Some(&note)).await?;
        }

        let (book, successor) = match outcome {
            CloseOutcome::Settled => {
                let book = set_status(&mut tx, book_id, BookStatus::Paid).await?;
                (book, None)
            }
            CloseOutcome::CarryForward { remainder } => {
                // The single-open index admits the successor only once the
                // original book has left the open state.
                let closed = set_status(&mut tx, book_id, BookStatus::Closed).await?;

                let successor_id = Uuid::new_v4();
                let successor = sqlx::query_as::<_, Book>(&format!(
                    r#"
                    INSERT INTO books (book_id, client, parent_id, invoice_number, name, status)
                    VALUES ($1, 'deep_blue', NULL, NULL, $2, 'open')
                    RETURNING {BOOK_COLUMNS}
                    "#,
                ))
                .bind(successor_id)
                .bind(successor_name(&book.name))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to create successor book: {}",
                        e
                    ))
                })?;

                sqlx::query(
                    r#"
                    INSERT INTO items (item_id, book_id, description, amount, surcharge, carried_forward)
                    VALUES ($1, $2, $3, $4, FALSE, TRUE)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(successor.book_id)
                .bind(carryover_description(&book.name))
                .bind(remainder)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to seed successor: {}", e))
                })?;

                (closed, Some(successor))
            }
        };

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to commit: {}", e)))?;

        timer.observe_duration();

        info!(
            book_id = %book.book_id,
            status = %book.status,
            successor = ?successor.as_ref().map(|s| s.book_id),
            "Book closed"
        );

        Ok((book, successor))
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })
    }
}

/// Fetch a book row with a `FOR UPDATE` lock.
async fn lock_book(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> Result<Option<Book>, AppError> {
    sqlx::query_as::<_, Book>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books WHERE book_id = $1 FOR UPDATE"
    ))
    .bind(book_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock book: {}", e)))
}

/// Compute the book's balance under the current transaction. The charged
/// total applies the surcharge in SQL, mirroring `Item::final_amount`;
/// for Deep Blue books no item carries the flag, so this equals the base
/// total.
async fn balance_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
) -> Result<Balance, AppError> {
    let charged: Option<Decimal> = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount * CASE WHEN surcharge THEN 1.10 ELSE 1 END), 0)
        FROM items
        WHERE book_id = $1
        "#,
    )
    .bind(book_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum items: {}", e)))?;

    let paid: Option<Decimal> =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to sum payments: {}", e))
            })?;

    Ok(Balance::new(
        charged.unwrap_or(Decimal::ZERO),
        paid.unwrap_or(Decimal::ZERO),
    ))
}

async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
    paid_on: Option<chrono::NaiveDate>,
    amount: Decimal,
    method: &str,
    note: Option<&str>,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (payment_id, book_id, paid_on, amount, method, note)
        VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6)
        RETURNING {PAYMENT_COLUMNS}
        "#,
    ))
    .bind(Uuid::new_v4())
    .bind(book_id)
    .bind(paid_on)
    .bind(amount)
    .bind(method)
    .bind(note)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment: {}", e)))
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    book_id: Uuid,
    status: BookStatus,
) -> Result<Book, AppError> {
    sqlx::query_as::<_, Book>(&format!(
        "UPDATE books SET status = $2 WHERE book_id = $1 RETURNING {BOOK_COLUMNS}"
    ))
    .bind(book_id)
    .bind(status.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update status: {}", e)))
}
