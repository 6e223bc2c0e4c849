//! # Portier Crypto
//!
//! Core cryptographic primitives for Portier.
//!
//! This crate provides the low-level operations the rest of the workspace
//! builds on:
//! - Session signing key pairs (ECDSA P-256)
//! - Symmetric encryption (AES-256-GCM)
//! - SHA-256 digests for credential secrets
//! - Secure random generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod hash;
pub mod keys;
pub mod random;

pub use error::CryptoError;
pub use keys::{SigningKeyPair, SigningPublicKey, SymmetricKey};
