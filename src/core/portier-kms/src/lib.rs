//! # Portier KMS
//!
//! Envelope encryption of session signing keys against a remote key
//! management service.
//!
//! ## Backends
//!
//! - `aws_kms_v1`: AWS KMS, asymmetric `RSAES_OAEP_SHA_256`
//! - `gcp_kms_v1`: Google Cloud KMS, symmetric key
//!
//! Both are reached through the same [`KeyProtector`] contract. Each call is
//! exactly one round trip: no caching, no retry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aws;
pub mod config;
pub mod error;
pub mod gcp;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

use async_trait::async_trait;
use zeroize::Zeroizing;

pub use aws::AwsKmsV1;
pub use config::{KmsBackend, KmsConfig};
pub use error::KmsError;
pub use gcp::GcpKmsV1;

/// Encrypts and decrypts opaque payloads with a key that never leaves the
/// key management service.
#[async_trait]
pub trait KeyProtector: Send + Sync {
    /// Encrypts `plaintext`, returning backend-specific ciphertext.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError>;

    /// Decrypts ciphertext produced by [`KeyProtector::encrypt`].
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError>;
}

/// A configured key management backend.
#[derive(Debug)]
pub enum Kms {
    /// AWS KMS.
    AwsKmsV1(AwsKmsV1),
    /// Google Cloud KMS.
    GcpKmsV1(GcpKmsV1),
}

impl Kms {
    /// Builds the backend client described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Configuration`] when the ambient cloud credentials
    /// needed by the backend cannot be found.
    pub async fn new(config: KmsConfig) -> Result<Self, KmsError> {
        match config {
            KmsConfig::AwsKmsV1 {
                key_id,
                base_endpoint,
            } => Ok(Self::AwsKmsV1(AwsKmsV1::new(key_id, base_endpoint).await?)),
            KmsConfig::GcpKmsV1 {
                key_name,
                base_endpoint,
            } => Ok(Self::GcpKmsV1(GcpKmsV1::new(key_name, base_endpoint).await?)),
        }
    }

    /// Returns the backend this instance talks to.
    pub fn backend(&self) -> KmsBackend {
        match self {
            Self::AwsKmsV1(_) => KmsBackend::AwsKmsV1,
            Self::GcpKmsV1(_) => KmsBackend::GcpKmsV1,
        }
    }
}

#[async_trait]
impl KeyProtector for Kms {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        match self {
            Self::AwsKmsV1(kms) => kms.encrypt(plaintext).await,
            Self::GcpKmsV1(kms) => kms.encrypt(plaintext).await,
        }
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        match self {
            Self::AwsKmsV1(kms) => kms.decrypt(ciphertext).await,
            Self::GcpKmsV1(kms) => kms.decrypt(ciphertext).await,
        }
    }
}
