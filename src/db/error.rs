//! Database error types.
//!
//! This module provides the error type for repository and migration
//! operations. It uses miette for fancy diagnostic output and thiserror for
//! derive macros. Driver errors are classified on conversion so callers can
//! match on constraint violations without inspecting SQLite messages.

use miette::Diagnostic;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Which integrity rule a rejected statement broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
            ConstraintKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Database operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Entity not found: {entity_type} with id '{id}'")]
    #[diagnostic(code(shopdb::db::not_found))]
    NotFound { entity_type: String, id: String },

    #[error("Constraint violation ({kind}): {message}")]
    #[diagnostic(
        code(shopdb::db::constraint),
        help("A referenced row is missing, still in use, or a key is duplicated")
    )]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    #[error("Invalid data: {message}")]
    #[diagnostic(code(shopdb::db::invalid_data))]
    InvalidData {
        message: String,
        #[help]
        help: String,
    },

    #[error("Database error: {message}")]
    #[diagnostic(code(shopdb::db::database_error))]
    Database { message: String },

    #[error("Migration error: {message}")]
    #[diagnostic(code(shopdb::db::migration_error))]
    Migration { message: String },

    #[error("Connection error: {message}")]
    #[diagnostic(code(shopdb::db::connection_error))]
    Connection { message: String },
}

impl DbError {
    /// True when the error is a constraint violation of the given kind.
    pub fn is_constraint(&self, expected: ConstraintKind) -> bool {
        matches!(self, DbError::Constraint { kind, .. } if *kind == expected)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => {
                let kind = match db_err.kind() {
                    ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                    ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                    ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                    ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                    _ if db_err.message().contains("constraint failed") => {
                        Some(ConstraintKind::Other)
                    }
                    _ => None,
                };
                match kind {
                    Some(kind) => DbError::Constraint {
                        kind,
                        message: db_err.message().to_string(),
                    },
                    None => DbError::Database {
                        message: e.to_string(),
                    },
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Connection {
                    message: e.to_string(),
                }
            }
            sqlx::Error::Migrate(_) => DbError::Migration {
                message: e.to_string(),
            },
            _ => DbError::Database {
                message: e.to_string(),
            },
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration {
            message: e.to_string(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
