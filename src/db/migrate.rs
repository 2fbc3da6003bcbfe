//! Versioned schema migrations.
//!
//! Scripts live in `migrations/` as `<version>_<description>.up.sql` and
//! `.down.sql` pairs. Applied versions are tracked by sqlx in the
//! `_sqlx_migrations` table.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::migrate::Migrate;
use tracing::info;

use crate::db::schema::{self, SchemaDiff};
use crate::db::{DbError, DbResult, SqliteDatabase};

const DEFAULT_UP: &str = "-- Add up migration script here\n";
const DEFAULT_DOWN: &str = "-- Add down migration script here\n";

/// A known migration and whether the database has it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

/// One row of the migration tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub description: String,
    pub installed_on: NaiveDateTime,
    pub success: bool,
    pub execution_time_ms: i64,
}

/// Paths of a freshly written migration pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFiles {
    pub version: i64,
    pub up: PathBuf,
    pub down: PathBuf,
}

/// Versions recorded as applied, oldest first.
async fn applied_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let mut versions: Vec<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    Ok(versions)
}

/// Apply every pending migration in version order.
///
/// Returns the number applied; a second call returns 0.
pub async fn apply(db: &SqliteDatabase) -> DbResult<usize> {
    let before = applied_versions(db.pool()).await?.len();
    db.migrator().run(db.pool()).await?;
    let after = applied_versions(db.pool()).await?.len();

    let applied = after.saturating_sub(before);
    if applied > 0 {
        info!(applied, total = after, "migrations applied");
    }
    Ok(applied)
}

/// Revert the latest `steps` applied migrations with their down scripts.
pub async fn revert(db: &SqliteDatabase, steps: usize) -> DbResult<usize> {
    let mut versions = applied_versions(db.pool()).await?;
    if steps == 0 || versions.is_empty() {
        return Ok(0);
    }
    versions.reverse();

    // Everything newer than the target is undone
    let target = versions.get(steps).copied().unwrap_or(0);
    let reverted = steps.min(versions.len());

    db.migrator().undo(db.pool(), target).await?;

    info!(reverted, target, "migrations reverted");
    Ok(reverted)
}

/// Every known migration with its applied flag, by version.
pub async fn status(db: &SqliteDatabase) -> DbResult<Vec<MigrationStatus>> {
    let applied: HashSet<i64> = applied_versions(db.pool()).await?.into_iter().collect();

    Ok(db
        .migrator()
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}

/// Applied migrations from the tracking table, newest first.
pub async fn history(db: &SqliteDatabase) -> DbResult<Vec<MigrationRecord>> {
    let mut conn = db.pool().acquire().await?;
    conn.ensure_migrations_table().await?;

    let rows: Vec<(i64, String, NaiveDateTime, bool, i64)> = sqlx::query_as(
        "SELECT version, description, installed_on, success, execution_time \
         FROM _sqlx_migrations ORDER BY version DESC",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(version, description, installed_on, success, nanos)| MigrationRecord {
                version,
                description,
                installed_on,
                success,
                execution_time_ms: nanos / 1_000_000,
            },
        )
        .collect())
}

/// Lowercase the description and collapse every other character run to `_`.
pub fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

fn io_error(path: &Path, e: std::io::Error) -> DbError {
    DbError::Migration {
        message: format!("{}: {}", path.display(), e),
    }
}

/// Highest version prefix among the files of a migrations directory.
fn latest_version(dir: &Path) -> DbResult<i64> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut latest = 0;
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some((prefix, _)) = name.split_once('_') else {
            continue;
        };
        if let Ok(version) = prefix.parse::<i64>() {
            latest = latest.max(version);
        }
    }
    Ok(latest)
}

/// Write a new reversible migration pair with the next version number.
pub fn create(
    dir: &Path,
    description: &str,
    up_sql: Option<&str>,
    down_sql: Option<&str>,
) -> DbResult<MigrationFiles> {
    let slug = slugify(description);
    if slug.is_empty() {
        return Err(DbError::InvalidData {
            message: format!("migration description '{}' has no usable characters", description),
            help: "Use letters or digits, e.g. \"add_product_sku\"".to_string(),
        });
    }

    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let version = latest_version(dir)? + 1;
    let up = dir.join(format!("{:04}_{}.up.sql", version, slug));
    let down = dir.join(format!("{:04}_{}.down.sql", version, slug));

    fs::write(&up, up_sql.unwrap_or(DEFAULT_UP)).map_err(|e| io_error(&up, e))?;
    fs::write(&down, down_sql.unwrap_or(DEFAULT_DOWN)).map_err(|e| io_error(&down, e))?;

    info!(version, path = %up.display(), "migration created");
    Ok(MigrationFiles { version, up, down })
}

/// Compare the declared schema with the live database.
pub async fn check(db: &SqliteDatabase) -> DbResult<SchemaDiff> {
    schema::diff(db.pool(), schema::schema()).await
}

/// Write a migration that brings the database in line with the declared
/// schema, or `None` when nothing declared is missing.
///
/// Drift that cannot be repaired by a generated script is an error and
/// writes no files.
pub async fn autogenerate(
    db: &SqliteDatabase,
    dir: &Path,
    description: &str,
) -> DbResult<Option<MigrationFiles>> {
    let diff = check(db).await?;
    if !diff.has_missing() {
        return Ok(None);
    }

    let (up, down) = diff.to_sql(schema::schema())?;
    create(dir, description, Some(&up), Some(&down)).map(Some)
}
