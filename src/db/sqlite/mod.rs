//! SQLite implementation of the database traits.
//!
//! This module provides a SQLite-backed implementation of the repository
//! traits defined in the parent module.

mod connection;
mod helpers;
mod order;
mod product;
mod report;
mod user;

#[cfg(test)]
mod report_test;

pub use connection::{SqliteDatabase, SqliteSession, embedded_migrator};
pub use order::SqliteOrderRepository;
pub use product::SqliteProductRepository;
pub use report::SqliteReportRepository;
pub use user::SqliteUserRepository;
