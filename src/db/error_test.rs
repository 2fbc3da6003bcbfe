//! Tests for database error types.

use crate::db::{ConstraintKind, DbError, DbResult};

#[test]
fn not_found_error_displays_correctly() {
    let err = DbError::NotFound {
        entity_type: "User".to_string(),
        id: "42".to_string(),
    };
    assert_eq!(err.to_string(), "Entity not found: User with id '42'");
}

#[test]
fn constraint_error_displays_kind() {
    let err = DbError::Constraint {
        kind: ConstraintKind::ForeignKey,
        message: "FOREIGN KEY constraint failed".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Constraint violation (foreign key): FOREIGN KEY constraint failed"
    );
}

#[test]
fn is_constraint_matches_only_that_kind() {
    let err = DbError::Constraint {
        kind: ConstraintKind::Unique,
        message: "UNIQUE constraint failed: order_products.order_id".to_string(),
    };
    assert!(err.is_constraint(ConstraintKind::Unique));
    assert!(!err.is_constraint(ConstraintKind::ForeignKey));

    let other = DbError::Database {
        message: "disk I/O error".to_string(),
    };
    assert!(!other.is_constraint(ConstraintKind::Unique));
}

#[test]
fn invalid_data_error_displays_message_only() {
    let err = DbError::InvalidData {
        message: "price has too many digits".to_string(),
        help: "Use at most 12 integer digits".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid data: price has too many digits");
}

#[test]
fn migration_error_displays_correctly() {
    let err = DbError::Migration {
        message: "failed to apply migration 0002".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Migration error: failed to apply migration 0002"
    );
}

#[test]
fn row_not_found_maps_to_database_error() {
    let err: DbError = sqlx::Error::RowNotFound.into();
    assert!(matches!(err, DbError::Database { .. }));
}

#[test]
fn pool_timeout_maps_to_connection_error() {
    let err: DbError = sqlx::Error::PoolTimedOut.into();
    assert!(matches!(err, DbError::Connection { .. }));
}

#[test]
fn db_result_err_returns_error() {
    let result: DbResult<i64> = Err(DbError::NotFound {
        entity_type: "Order".to_string(),
        id: "7".to_string(),
    });
    assert!(result.is_err());
}
