//! Backend API keys.
//!
//! A secret is `portier_secret_key_` followed by 128 random bits in base 36.
//! Only the SHA-256 of those 16 raw bytes is stored; the secret itself is
//! shown once, at creation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use portier_crypto::{hash, random};
use portier_ids::{BACKEND_API_KEY, BACKEND_API_KEY_SECRET_TOKEN, PROJECT};
use portier_storage::{BackendApiKeyRecord, IdentityStore, NewBackendApiKey, StorageError};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{AuthBackend, AuthError, BackendApiKeyContext, IdentityContext};

const SECRET_BYTES: usize = 16;

/// A new key together with its one-time secret.
pub struct CreatedBackendApiKey {
    /// The stored key.
    pub record: BackendApiKeyRecord,
    /// The bearer secret. Not recoverable later.
    pub secret: Zeroizing<String>,
}

impl fmt::Debug for CreatedBackendApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedBackendApiKey")
            .field("record", &self.record)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Creates and checks backend API keys.
#[derive(Clone)]
pub struct BackendApiKeys {
    store: Arc<dyn IdentityStore>,
}

impl BackendApiKeys {
    /// Creates the service over `store`.
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Mints a key for `project_id`.
    pub async fn create(
        &self,
        project_id: Uuid,
        display_name: &str,
        authentication_only: bool,
        now: i64,
    ) -> Result<CreatedBackendApiKey, AuthError> {
        let raw = random::generate_bytes(SECRET_BYTES);
        let secret_bytes: [u8; SECRET_BYTES] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::Internal("secret has wrong length".to_string()))?;
        let secret = Zeroizing::new(BACKEND_API_KEY_SECRET_TOKEN.format(Uuid::from_bytes(secret_bytes)));

        let record = self
            .store
            .create_backend_api_key(&NewBackendApiKey {
                id: Uuid::new_v4(),
                project_id,
                display_name: display_name.to_string(),
                secret_sha256: hash::sha256(&secret_bytes),
                authentication_only,
                created_at: now,
            })
            .await?;

        info!(
            project_id = %PROJECT.format(project_id),
            backend_api_key_id = %BACKEND_API_KEY.format(record.id),
            authentication_only,
            "Created backend API key"
        );

        Ok(CreatedBackendApiKey { record, secret })
    }

    /// Revokes a key of `project_id`.
    ///
    /// Fails with [`StorageError::NotFound`] when the project has no such key.
    pub async fn revoke(&self, project_id: Uuid, backend_api_key_id: Uuid) -> Result<(), StorageError> {
        self.store
            .revoke_backend_api_key(project_id, backend_api_key_id)
            .await?;
        info!(
            project_id = %PROJECT.format(project_id),
            backend_api_key_id = %BACKEND_API_KEY.format(backend_api_key_id),
            "Revoked backend API key"
        );
        Ok(())
    }

    /// Looks up the key behind `secret`.
    pub async fn authenticate(&self, secret: &str) -> Result<BackendApiKeyContext, AuthError> {
        let Ok(token) = BACKEND_API_KEY_SECRET_TOKEN.parse(secret) else {
            debug!("Malformed backend API key secret");
            return Err(AuthError::Unauthenticated);
        };

        let digest = hash::sha256(token.as_bytes());
        let record = match self.store.get_backend_api_key_by_secret_hash(&digest).await? {
            Some(record) if !record.revoked => record,
            Some(record) => {
                debug!(
                    backend_api_key_id = %BACKEND_API_KEY.format(record.id),
                    "Revoked backend API key presented"
                );
                return Err(AuthError::Unauthenticated);
            }
            None => {
                debug!("Unknown backend API key presented");
                return Err(AuthError::Unauthenticated);
            }
        };

        Ok(BackendApiKeyContext {
            backend_api_key_id: record.id,
            project_id: record.project_id,
            authentication_only: record.authentication_only,
        })
    }
}

#[async_trait]
impl AuthBackend for BackendApiKeys {
    async fn validate(&self, credential: &str) -> Result<IdentityContext, AuthError> {
        self.authenticate(credential)
            .await
            .map(IdentityContext::BackendApiKey)
    }

    fn name(&self) -> &'static str {
        "backend-api-key"
    }
}
