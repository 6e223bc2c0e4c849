//! Authentication error types.

use portier_session::SessionError;
use portier_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during authentication.
///
/// `Unauthenticated` never says which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed or unrecognized credential.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated, but the credential may not call this procedure.
    #[error("permission denied")]
    PermissionDenied,

    /// Stored data that should be impossible.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Store, key-protector or other backend failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AuthenticationFailed => Self::Unauthenticated,
            SessionError::Integrity(msg) => Self::Integrity(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_mapping() {
        assert!(matches!(
            AuthError::from(SessionError::AuthenticationFailed),
            AuthError::Unauthenticated
        ));
        assert!(matches!(
            AuthError::from(SessionError::Integrity("org".into())),
            AuthError::Integrity(_)
        ));
        assert!(matches!(
            AuthError::from(SessionError::Storage(StorageError::ConnectionFailed("x".into()))),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn test_unauthenticated_has_no_detail() {
        assert_eq!(AuthError::Unauthenticated.to_string(), "unauthenticated");
    }
}
