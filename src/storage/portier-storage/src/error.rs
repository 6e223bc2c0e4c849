//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entry not found.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Entry already exists (unique constraint).
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// A precondition checked inside the transaction did not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A concurrent writer held the database.
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),

    /// The daily email quota of a project is used up.
    #[error("email daily quota exceeded: {usage} of {quota}")]
    QuotaExceeded {
        /// Usage after the rejected increment.
        usage: u32,
        /// Effective daily quota.
        quota: u32,
    },

    /// Connection error.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution error.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Caller supplied an invalid value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transaction begin or commit failed.
    #[error("transaction error: {0}")]
    Transaction(String),
}
