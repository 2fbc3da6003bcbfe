//! SQLite connection pool and session management.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, info};

use super::{
    SqliteOrderRepository, SqliteProductRepository, SqliteReportRepository, SqliteUserRepository,
};
use crate::config::{Config, DatabaseSource};
use crate::db::{Database, DbError, DbResult, Session, migrate};

/// Migrations compiled into the binary from `migrations/`.
pub fn embedded_migrator() -> Migrator {
    sqlx::migrate!("./migrations")
}

/// SQLite database implementation.
///
/// Owns the connection pool and the migration set; hands out sessions that
/// each hold one pooled connection.
pub struct SqliteDatabase {
    pool: SqlitePool,
    migrator: Migrator,
}

impl SqliteDatabase {
    /// Connect using the given configuration.
    pub async fn connect(config: &Config) -> DbResult<Self> {
        let in_memory = config.is_in_memory();

        let options = match &config.database {
            DatabaseSource::File(path) => SqliteConnectOptions::new().filename(path),
            DatabaseSource::Url(url) => {
                SqliteConnectOptions::from_str(url).map_err(|e| DbError::Connection {
                    message: format!("invalid database url '{}': {}", url, e),
                })?
            }
        };
        let mut options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);

            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| DbError::Connection {
                        message: format!("cannot create {}: {}", parent.display(), e),
                    })?;
                }
            }
        }

        // Every connection to `:memory:` is its own database, so keep exactly
        // one alive for the lifetime of the pool. A second acquire while it is
        // held waits no longer than the busy timeout.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .acquire_timeout(Duration::from_millis(config.busy_timeout_ms))
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        let migrator = match &config.migrations_dir {
            Some(dir) => Migrator::new(dir.clone()).await?,
            None => embedded_migrator(),
        };

        info!(
            database = %config.database,
            max_connections = if in_memory { 1 } else { config.max_connections },
            "database pool ready"
        );

        Ok(Self { pool, migrator })
    }

    /// Open a database file at the given path with default settings.
    ///
    /// The path is used as is, so `?`, `#` and `%` in file names are safe.
    pub async fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::connect(&Config::default().with_db_path(path)).await
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// The pool holds a single connection and every session borrows it, so
    /// only one session can be open at a time. While one is held, another
    /// `session()` or `migrate()` fails with `DbError::Connection` after the
    /// busy timeout.
    pub async fn in_memory() -> DbResult<Self> {
        Self::connect(&Config::in_memory()).await
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the migration set this database was opened with.
    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Database for SqliteDatabase {
    type Session = SqliteSession;

    async fn migrate(&self) -> DbResult<usize> {
        migrate::apply(self).await
    }

    async fn session(&self) -> DbResult<SqliteSession> {
        let conn = self.pool.acquire().await?;
        debug!("session acquired");
        Ok(SqliteSession { conn })
    }
}

/// One pooled connection held for a unit of work.
///
/// Dropping the session returns the connection to the pool.
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

impl SqliteSession {
    /// Direct access to the connection for raw statements.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Session for SqliteSession {
    type Users<'a> = SqliteUserRepository<'a>;
    type Orders<'a> = SqliteOrderRepository<'a>;
    type Products<'a> = SqliteProductRepository<'a>;
    type Reports<'a> = SqliteReportRepository<'a>;

    fn users(&mut self) -> SqliteUserRepository<'_> {
        SqliteUserRepository {
            conn: &mut self.conn,
        }
    }

    fn orders(&mut self) -> SqliteOrderRepository<'_> {
        SqliteOrderRepository {
            conn: &mut self.conn,
        }
    }

    fn products(&mut self) -> SqliteProductRepository<'_> {
        SqliteProductRepository {
            conn: &mut self.conn,
        }
    }

    fn reports(&mut self) -> SqliteReportRepository<'_> {
        SqliteReportRepository {
            conn: &mut self.conn,
        }
    }
}
