use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("{entity} {id} not found")]
    #[diagnostic(code(shopdb::cli::not_found))]
    NotFound { entity: &'static str, id: i64 },

    #[error("Failed to read {path}")]
    #[diagnostic(code(shopdb::cli::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {message}")]
    #[diagnostic(
        code(shopdb::cli::invalid_json),
        help("Expected a JSON array of objects with title, price and an optional description")
    )]
    InvalidJson { message: String },

    #[error("Invalid input: {message}")]
    #[diagnostic(code(shopdb::cli::invalid_input))]
    InvalidInput { message: String },
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::InvalidJson {
            message: e.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
