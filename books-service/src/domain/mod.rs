//! Pure business logic: money arithmetic and the book lifecycle.
//! Nothing in here touches the database.

pub mod balance;
pub mod lifecycle;
