//! In-memory key protectors for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use portier_crypto::{aead, SymmetricKey};
use zeroize::Zeroizing;

use crate::error::KmsError;
use crate::KeyProtector;

const AAD: &[u8] = b"portier-local-kms";

/// AES-256-GCM protector with a random in-process key.
#[derive(Debug)]
pub struct LocalKeyProtector {
    key: SymmetricKey,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl LocalKeyProtector {
    /// Creates a protector with a fresh key.
    pub fn new() -> Self {
        Self {
            key: SymmetricKey::generate(),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    /// Number of successful `encrypt` calls so far.
    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    /// Number of successful `decrypt` calls so far.
    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl Default for LocalKeyProtector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyProtector for LocalKeyProtector {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let sealed = aead::seal(&self.key, plaintext, AAD).map_err(|e| KmsError::Backend {
            backend: "local",
            operation: "encrypt",
            message: e.to_string(),
        })?;
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(sealed)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        let opened = aead::open(&self.key, ciphertext, AAD).map_err(|e| KmsError::Backend {
            backend: "local",
            operation: "decrypt",
            message: e.to_string(),
        })?;
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(opened)
    }
}

/// A protector whose backend is always unavailable.
#[derive(Debug, Default)]
pub struct FailingKeyProtector;

#[async_trait]
impl KeyProtector for FailingKeyProtector {
    async fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        Err(KmsError::Backend {
            backend: "failing",
            operation: "encrypt",
            message: "backend unavailable".to_string(),
        })
    }

    async fn decrypt(&self, _ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        Err(KmsError::Backend {
            backend: "failing",
            operation: "decrypt",
            message: "backend unavailable".to_string(),
        })
    }
}
