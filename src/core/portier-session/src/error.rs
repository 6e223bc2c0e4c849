//! Session error types.

use portier_crypto::CryptoError;
use portier_kms::KmsError;
use portier_storage::StorageError;
use thiserror::Error;

/// Errors from signing key management, token handling, and provisioning.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The presented token is not acceptable. The reason is logged, never
    /// returned.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Stored data contradicts itself, e.g. a session's organization backs
    /// no project.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// A project has no signing key left to issue tokens with.
    #[error("no active session signing key for project {0}")]
    NoActiveSigningKey(String),

    /// Caller supplied an invalid value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key protector failure.
    #[error(transparent)]
    Kms(#[from] KmsError),

    /// Key generation, encoding, or signing failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
