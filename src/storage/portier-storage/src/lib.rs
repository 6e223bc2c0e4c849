//! # Portier Storage
//!
//! Storage abstraction layer for Portier.
//!
//! Defines the [`IdentityStore`] trait implemented by storage backends, the
//! records it reads and writes, and the daily email quota policy built on
//! top of it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod model;
pub mod quota;
pub mod store;

pub use error::StorageError;
pub use model::{
    BackendApiKeyRecord, NewBackendApiKey, NewConsoleProject, NewProject, NewSigningKey, NewUser,
    Project, ProjectUpdate, SigningKeyRecord,
};
pub use quota::{DailyEmailQuota, EmailQuotaConfig, QuotaUsage};
pub use store::IdentityStore;
