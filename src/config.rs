//! Runtime configuration.
//!
//! Values come from `SHOPDB_*` environment variables, optionally seeded from
//! a `.env` file in the current directory. Paths follow the XDG base
//! directory layout.

use std::env;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

pub const DATABASE_URL_VAR: &str = "SHOPDB_DATABASE_URL";
pub const DB_PATH_VAR: &str = "SHOPDB_DB_PATH";
pub const MAX_CONNECTIONS_VAR: &str = "SHOPDB_MAX_CONNECTIONS";
pub const BUSY_TIMEOUT_VAR: &str = "SHOPDB_BUSY_TIMEOUT_MS";
pub const MIGRATIONS_DIR_VAR: &str = "SHOPDB_MIGRATIONS_DIR";

const APP_DIR: &str = "shopdb";
const DB_FILE: &str = "shop.db";
const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    #[diagnostic(
        code(shopdb::config::invalid),
        help("Expected a positive integer; unset the variable to use the default")
    )]
    Invalid { var: String, value: String },
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    /// Database file, opened by path with no URL parsing.
    File(PathBuf),
    /// sqlx SQLite URL, e.g. `sqlite:///var/lib/shop.db` or `sqlite::memory:`.
    Url(String),
}

impl std::fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseSource::File(path) => write!(f, "{}", path.display()),
            DatabaseSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseSource,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    /// Load migrations from here at runtime instead of the embedded set.
    pub migrations_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseSource::File(get_db_path()),
            max_connections: 5,
            busy_timeout_ms: 5000,
            migrations_dir: None,
        }
    }
}

impl Config {
    /// Settings for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseSource::Url(IN_MEMORY_URL.to_string()),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        match &self.database {
            DatabaseSource::Url(url) => url.contains(":memory:") || url.contains("mode=memory"),
            DatabaseSource::File(_) => false,
        }
    }

    /// Point at a database file, replacing any configured URL.
    pub fn with_db_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database = DatabaseSource::File(path.as_ref().to_path_buf());
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset
    /// or empty variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let database = match (get(DATABASE_URL_VAR), get(DB_PATH_VAR)) {
            (Some(url), _) => DatabaseSource::Url(url),
            (None, Some(path)) => DatabaseSource::File(PathBuf::from(path)),
            (None, None) => DatabaseSource::File(data_dir_from(&get).join(DB_FILE)),
        };

        let defaults = Self::default();
        let config = Self {
            database,
            max_connections: parse_positive(&get, MAX_CONNECTIONS_VAR)?
                .unwrap_or(defaults.max_connections),
            busy_timeout_ms: parse_positive(&get, BUSY_TIMEOUT_VAR)?
                .unwrap_or(defaults.busy_timeout_ms),
            migrations_dir: get(MIGRATIONS_DIR_VAR).map(PathBuf::from),
        };

        debug!(database = %config.database, "configuration loaded");
        Ok(config)
    }
}

fn parse_positive<T, F>(get: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(Some(value)),
        _ => Err(ConfigError::Invalid {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Load `.env` from the current directory if present.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded .env from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => debug!("Failed to load .env: {}", e),
    }
}

fn data_dir_from<F>(get: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let data_home = get("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| get("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_home.join(APP_DIR)
}

/// Get XDG-compliant data directory for shopdb.
///
/// # Returns
/// Path to data directory: `~/.local/share/shopdb/`
pub fn get_data_dir() -> PathBuf {
    data_dir_from(&|var: &str| env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Get database file path (data_dir/shop.db).
pub fn get_db_path() -> PathBuf {
    get_data_dir().join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_use_xdg_data_home() {
        let config = Config::from_lookup(lookup(&[("XDG_DATA_HOME", "/data")])).unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/data/shopdb/shop.db"))
        );
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.migrations_dir, None);
    }

    #[test]
    fn test_falls_back_to_home() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/ann")])).unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/home/ann/.local/share/shopdb/shop.db"))
        );
    }

    #[test]
    fn test_url_wins_over_path() {
        let config = Config::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "sqlite::memory:"),
            (DB_PATH_VAR, "/tmp/ignored.db"),
        ]))
        .unwrap();
        assert!(config.is_in_memory());
    }

    #[test]
    fn test_db_path_and_numbers() {
        let config = Config::from_lookup(lookup(&[
            (DB_PATH_VAR, "/tmp/shop.db"),
            (MAX_CONNECTIONS_VAR, "12"),
            (BUSY_TIMEOUT_VAR, " 250 "),
            (MIGRATIONS_DIR_VAR, "/srv/migrations"),
        ]))
        .unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/tmp/shop.db"))
        );
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(
            config.migrations_dir,
            Some(PathBuf::from("/srv/migrations"))
        );
    }

    #[test]
    fn test_db_path_is_not_parsed_as_url() {
        let config =
            Config::from_lookup(lookup(&[(DB_PATH_VAR, "/tmp/a?mode=memory#b%20.db")])).unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/tmp/a?mode=memory#b%20.db"))
        );
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[(MAX_CONNECTIONS_VAR, "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: MAX_CONNECTIONS_VAR.to_string(),
                value: "lots".to_string(),
            }
        );

        let err = Config::from_lookup(lookup(&[(BUSY_TIMEOUT_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = Config::from_lookup(lookup(&[
            ("XDG_DATA_HOME", "/data"),
            (DATABASE_URL_VAR, ""),
            (MAX_CONNECTIONS_VAR, "  "),
        ]))
        .unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/data/shopdb/shop.db"))
        );
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_with_db_path_overrides_url() {
        let config = Config::in_memory().with_db_path("/tmp/other.db");
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/tmp/other.db"))
        );
        assert!(!config.is_in_memory());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        unsafe {
            env::set_var(DB_PATH_VAR, "/tmp/env-shop.db");
            env::set_var(MAX_CONNECTIONS_VAR, "3");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.database,
            DatabaseSource::File(PathBuf::from("/tmp/env-shop.db"))
        );
        assert_eq!(config.max_connections, 3);

        unsafe {
            env::remove_var(DB_PATH_VAR);
            env::remove_var(MAX_CONNECTIONS_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_get_db_path_ends_with_shop_db() {
        let path = get_db_path();
        assert!(path.ends_with("shopdb/shop.db"));
    }
}
