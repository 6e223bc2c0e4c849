//! KMS error types.

use thiserror::Error;

/// Errors returned by key management backends.
#[derive(Debug, Error)]
pub enum KmsError {
    /// Backend selection or client construction failed.
    #[error("kms configuration error: {0}")]
    Configuration(String),

    /// The backend rejected the request or could not be reached.
    #[error("{backend} {operation} failed: {message}")]
    Backend {
        /// Backend name, as accepted in configuration.
        backend: &'static str,
        /// `encrypt` or `decrypt`.
        operation: &'static str,
        /// Error detail from the transport or the service.
        message: String,
    },

    /// The backend answered with a response missing the expected payload.
    #[error("malformed kms response: {0}")]
    MalformedResponse(String),
}
