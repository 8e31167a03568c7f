//! Error types for Record Store operations

use thiserror::Error;

use crate::statement::Comparison;

/// Errors that can occur during record store operations
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Level {requested} not allowed because the statement only has {existing} levels")]
    LevelGap { requested: usize, existing: usize },

    #[error("Cannot use comparison operator {0:?} for NULL values")]
    NullComparison(Comparison),

    #[error("HAVING statement was set without GROUP BY")]
    HavingWithoutGroupBy,

    #[error("No column type mapping for '{0}'")]
    UnmappedType(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordStoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store_not_found(msg: impl Into<String>) -> Self {
        Self::StoreNotFound(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RecordStoreError>;
