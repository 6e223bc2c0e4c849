//! # Portier Session
//!
//! Human session credentials.
//!
//! - [`SigningKeyManager`]: per-project P-256 signing keys whose private
//!   halves are only ever stored encrypted by a [`KeyProtector`](portier_kms::KeyProtector)
//! - [`SessionTokens`]: issues and verifies ES256 session tokens
//! - [`ProjectProvisioner`]: console bootstrap and tenant project creation,
//!   each project receiving its first signing key

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod error;
pub mod projects;
pub mod signing_keys;
pub mod token;

#[cfg(test)]
mod testing;

pub use claims::SessionClaims;
pub use error::SessionError;
pub use projects::{
    ConsoleProject, ConsoleProjectRequest, CreatedProject, ProjectProvisioner, ProjectRequest,
};
pub use signing_keys::{Jwk, SessionPublicKey, SigningKeyManager, SigningKeyPolicy};
pub use token::{IssuedToken, SessionIdentity, SessionSubject, SessionTokens, TokenConfig};

/// Returns the current Unix timestamp.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_secs() as i64
}
