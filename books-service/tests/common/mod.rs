//! Common test utilities for books-service integration tests.
//!
//! These tests need a running PostgreSQL; point TEST_DATABASE_URL at one to
//! enable them. When the variable is unset every test skips itself.

use books_service::config::{Config, DatabaseConfig, ServerConfig};
use books_service::startup::Application;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde_json::Value;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,books_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application against TEST_DATABASE_URL, or None when no
    /// test database is configured.
    pub async fn spawn() -> Option<TestApp> {
        init_tracing();

        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        };

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(database_url.clone()),
                max_connections: 2,
                min_connections: 1,
            },
            service_name: "books-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", app.port());

        // Every test starts from an empty dataset; the cascade clears items
        // and payments along with the books.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await
            .expect("Failed to connect to the test database");
        sqlx::query("TRUNCATE TABLE books CASCADE")
            .execute(&pool)
            .await
            .expect("Failed to truncate test tables");

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Some(TestApp {
            address,
            client: reqwest::Client::new(),
        })
    }

    pub async fn create_book(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/books", self.address))
            .json(body)
            .send()
            .await
            .expect("create_book request failed")
    }

    pub async fn list_books(&self, client: &str) -> Vec<Value> {
        self.client
            .get(format!("{}/books?client={}", self.address, client))
            .send()
            .await
            .expect("list_books request failed")
            .json::<Vec<Value>>()
            .await
            .expect("list_books body was not an array")
    }

    pub async fn get_book(&self, book_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/books/{}", self.address, book_id))
            .send()
            .await
            .expect("get_book request failed")
    }

    pub async fn delete_book(&self, book_id: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}/books/{}", self.address, book_id))
            .send()
            .await
            .expect("delete_book request failed")
    }

    pub async fn add_item(&self, book_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/books/{}/items", self.address, book_id))
            .json(body)
            .send()
            .await
            .expect("add_item request failed")
    }

    pub async fn add_payment(&self, book_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/books/{}/payments", self.address, book_id))
            .json(body)
            .send()
            .await
            .expect("add_payment request failed")
    }

    pub async fn close_book(&self, book_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/books/{}/close", self.address, book_id))
            .json(body)
            .send()
            .await
            .expect("close_book request failed")
    }

}

/// Parse a JSON string field holding a decimal amount.
pub fn dec(value: &Value) -> Decimal {
    Decimal::from_str_exact(value.as_str().expect("expected a decimal string"))
        .expect("invalid decimal")
}
