//! API errors and their HTTP shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use portier_auth::AuthError;
use portier_ids::IdFormatError;
use portier_session::SessionError;
use portier_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Errors returned by API handlers and the authentication middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid credential.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Credential not allowed to call this procedure.
    #[error("permission denied")]
    PermissionDenied,

    /// Malformed client input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything the client cannot fix. The cause is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body of this error.
    pub fn body(&self) -> ErrorBody {
        let (code, message) = match self {
            Self::Unauthenticated => ("unauthenticated", "unauthenticated".to_string()),
            Self::PermissionDenied => ("permission_denied", "permission denied".to_string()),
            Self::InvalidArgument(msg) => ("invalid_argument", msg.clone()),
            Self::NotFound(msg) => ("not_found", msg.clone()),
            Self::Internal(_) => ("internal", "internal error".to_string()),
        };
        ErrorBody {
            code: code.to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(cause) = &self {
            error!(error = %cause, "Internal API error");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => Self::Unauthenticated,
            AuthError::PermissionDenied => Self::PermissionDenied,
            AuthError::Integrity(msg) => Self::Internal(format!("integrity: {msg}")),
            AuthError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Storage(e) => e.into(),
            SessionError::InvalidInput(msg) => Self::InvalidArgument(msg),
            other => AuthError::from(other).into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::InvalidInput(msg) => Self::InvalidArgument(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<IdFormatError> for ApiError {
    fn from(err: IdFormatError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
