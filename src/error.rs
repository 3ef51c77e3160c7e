use thiserror::Error;

use crate::decimal::DecimalError;

/// Errors produced by record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The condition attached to an update or delete evaluated false.
    #[error("The conditional request failed")]
    ConditionFailed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Any fault reported by DynamoDB itself, with the SDK's message preserved.
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Number(#[from] DecimalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
