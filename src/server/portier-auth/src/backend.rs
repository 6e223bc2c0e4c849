//! Credential backend trait.

use async_trait::async_trait;

use crate::{AuthError, IdentityContext};

/// A kind of credential the authenticator can check.
///
/// Implementations turn a raw credential (the bearer secret, the cookie
/// value) into an [`IdentityContext`]. Scope checks against the called
/// procedure belong to the authenticator, not the backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Validates `credential` and returns the caller's identity.
    async fn validate(&self, credential: &str) -> Result<IdentityContext, AuthError>;

    /// Returns the name of this backend for logging.
    fn name(&self) -> &'static str;
}
