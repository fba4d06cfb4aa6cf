//! Error types for the store

use thiserror::Error;

/// Errors returned by keyspace, stream and transaction operations
///
/// Absence is never an error: reads of missing or expired keys return
/// `None` (or an empty collection) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key holds a value of another type
    #[error("WRONGTYPE operation against a key holding the wrong kind of value (expected {expected}, found {found})")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A consumer group with this name already exists on the stream
    #[error("BUSYGROUP consumer group name already exists")]
    GroupExists,

    /// The transaction was discarded (watched key changed or a queued command failed)
    #[error("EXECABORT transaction discarded")]
    TransactionAborted,

    #[error("ERR {0}")]
    InvalidArgument(String),

    /// Only raised by operations that require the target to exist
    #[error("ERR no such {0}")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    pub(crate) fn wrong_type(expected: &'static str, found: &'static str) -> Self {
        StoreError::TypeMismatch { expected, found }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("file error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Errors raised while starting an [`Engine`](crate::Engine)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start expiry sweeper: {0}")]
    Sweeper(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
