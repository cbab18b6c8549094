//! Domain models for books-service.

mod book;
mod item;
mod payment;

pub use book::{Book, BookStatus, Client, CreateBook};
pub use item::{CreateItem, Item};
pub use payment::{CreatePayment, Payment, PaymentMethod};
