//! Database abstraction layer.
//!
//! This module provides trait-based abstractions for data access over the
//! shop schema, with SQLite as the storage backend.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Domain entities (User, Order, Product, OrderProduct) and read shapes
//! - `repository`: Trait definitions for data access
//! - `migrate`: Versioned schema migrations
//! - `schema`: Declared schema and drift detection
//! - `sqlite`: SQLx implementation

mod error;
pub mod migrate;
mod models;
mod repository;
pub mod schema;
pub mod sqlite;

#[cfg(test)]
mod error_test;
#[cfg(test)]
mod models_test;

pub use error::{ConstraintKind, DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::{SqliteDatabase, SqliteSession};
