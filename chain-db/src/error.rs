//! Database error types

use chain_core::CoreError;
use thiserror::Error;

/// Database error type
#[derive(Error, Debug)]
pub enum DbError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unknown column family
    #[error("Unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Core type error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
