//! # Portier Auth
//!
//! Per-call authentication for the backend RPC surface.
//!
//! ## Credentials
//!
//! - Backend API keys, presented as `Authorization: Bearer <secret>`
//! - Console session tokens, presented in the
//!   `portier_<console project id>_access_token` cookie
//!
//! [`RequestAuthenticator`] picks exactly one path per call and produces a
//! [`CallContext`] that handlers receive explicitly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api_key;
pub mod authenticator;
pub mod backend;
pub mod context;
pub mod cookie;
pub mod error;
pub mod session_cookie;

pub use api_key::{BackendApiKeys, CreatedBackendApiKey};
pub use authenticator::{RequestAuthenticator, AUTHENTICATION_PROCEDURES, SKIP_PROCEDURES};
pub use backend::AuthBackend;
pub use context::{BackendApiKeyContext, CallContext, ConsoleSessionContext, IdentityContext};
pub use error::AuthError;
pub use session_cookie::ConsoleSessionBackend;

#[cfg(test)]
pub(crate) mod testing;
