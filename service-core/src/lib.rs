//! service-core: Shared infrastructure for the gestion workspace.
pub mod error;
pub mod middleware;

pub use axum;
pub use serde;
pub use serde_json;
pub use tower;
pub use tower_http;
pub use tracing;
pub use validator;
