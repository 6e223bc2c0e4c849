//! Per-project session signing keys.
//!
//! A key is generated in process, its PKCS#8 private half is encrypted by the
//! [`KeyProtector`] right away, and only the ciphertext is persisted. The
//! public half is stored in the clear as SPKI DER. Active keys are always read
//! from the store so expiry takes effect without any cache invalidation.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use portier_crypto::{SigningKeyPair, SigningPublicKey};
use portier_ids::{PROJECT, SESSION_SIGNING_KEY};
use portier_kms::KeyProtector;
use portier_storage::{IdentityStore, NewSigningKey, SigningKeyRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;
use crate::unix_now;

/// How long new signing keys stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningKeyPolicy {
    /// Time from creation to expiry. There is no automatic rotation: a new key
    /// is only added by [`SigningKeyManager::create_signing_key`].
    pub lifetime: Duration,
}

impl Default for SigningKeyPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(365 * 24 * 60 * 60),
        }
    }
}

/// The verifying half of a session signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPublicKey {
    /// Key id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// P-256 public key.
    pub public_key: SigningPublicKey,
    /// Expiry time, Unix seconds.
    pub expires_at: i64,
}

/// A public key in JSON Web Key form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Always `EC`.
    pub kty: String,
    /// Always `P-256`.
    pub crv: String,
    /// Formatted signing key id.
    pub kid: String,
    /// Base64url affine x coordinate.
    pub x: String,
    /// Base64url affine y coordinate.
    pub y: String,
    /// Always `ES256`.
    pub alg: String,
    /// Always `sig`.
    #[serde(rename = "use")]
    pub key_use: String,
}

impl SessionPublicKey {
    fn from_record(record: &SigningKeyRecord) -> Result<Self, SessionError> {
        Ok(Self {
            id: record.id,
            project_id: record.project_id,
            public_key: SigningPublicKey::from_spki_der(&record.public_key)?,
            expires_at: record.expires_at,
        })
    }

    /// The id as it appears in token headers.
    pub fn kid(&self) -> String {
        SESSION_SIGNING_KEY.format(self.id)
    }

    /// Renders the key as a JWK.
    pub fn to_jwk(&self) -> Result<Jwk, SessionError> {
        let (x, y) = self.public_key.coordinates()?;
        Ok(Jwk {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            kid: self.kid(),
            x: URL_SAFE_NO_PAD.encode(x),
            y: URL_SAFE_NO_PAD.encode(y),
            alg: "ES256".to_string(),
            key_use: "sig".to_string(),
        })
    }
}

/// Creates, stores and exposes per-project signing keys.
#[derive(Clone)]
pub struct SigningKeyManager {
    store: Arc<dyn IdentityStore>,
    kms: Arc<dyn KeyProtector>,
    policy: SigningKeyPolicy,
}

impl SigningKeyManager {
    /// Creates a manager over `store`, protecting private keys with `kms`.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        kms: Arc<dyn KeyProtector>,
        policy: SigningKeyPolicy,
    ) -> Self {
        Self { store, kms, policy }
    }

    pub(crate) fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Generates a key for `project_id` and encrypts its private half.
    ///
    /// Nothing is persisted: the result is meant to be written by the caller,
    /// possibly inside a larger transaction.
    pub async fn generate(&self, project_id: Uuid, now: i64) -> Result<NewSigningKey, SessionError> {
        let pair = SigningKeyPair::generate();

        let private_key_ciphertext = {
            let private_key = pair.to_pkcs8_der()?;
            self.kms.encrypt(&private_key).await?
        };
        let public_key = pair.public_key().to_spki_der()?;

        let lifetime = i64::try_from(self.policy.lifetime.as_secs())
            .map_err(|_| SessionError::InvalidInput("signing key lifetime too large".to_string()))?;

        Ok(NewSigningKey {
            id: Uuid::new_v4(),
            project_id,
            public_key,
            private_key_ciphertext,
            expires_at: now + lifetime,
            created_at: now,
        })
    }

    /// Generates and persists a new signing key for an existing project.
    pub async fn create_signing_key(&self, project_id: Uuid) -> Result<SessionPublicKey, SessionError> {
        self.create_signing_key_at(project_id, unix_now()).await
    }

    /// [`create_signing_key`](Self::create_signing_key) with an explicit clock.
    pub async fn create_signing_key_at(
        &self,
        project_id: Uuid,
        now: i64,
    ) -> Result<SessionPublicKey, SessionError> {
        let key = self.generate(project_id, now).await?;
        self.store.create_signing_key(&key).await?;

        info!(
            project_id = %PROJECT.format(project_id),
            kid = %SESSION_SIGNING_KEY.format(key.id),
            expires_at = key.expires_at,
            "Created session signing key"
        );

        Ok(SessionPublicKey {
            id: key.id,
            project_id,
            public_key: SigningPublicKey::from_spki_der(&key.public_key)?,
            expires_at: key.expires_at,
        })
    }

    /// Returns the project's unexpired public keys, latest expiry first.
    pub async fn active_public_keys(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SessionPublicKey>, SessionError> {
        self.active_public_keys_at(project_id, unix_now()).await
    }

    /// [`active_public_keys`](Self::active_public_keys) with an explicit clock.
    pub async fn active_public_keys_at(
        &self,
        project_id: Uuid,
        now: i64,
    ) -> Result<Vec<SessionPublicKey>, SessionError> {
        self.store
            .list_active_signing_keys(project_id, now)
            .await?
            .iter()
            .map(SessionPublicKey::from_record)
            .collect()
    }

    /// Decrypts the active key with the latest expiry.
    ///
    /// The returned key pair zeroizes itself on drop; callers keep it only for
    /// one signing operation.
    pub(crate) async fn signing_key_at(
        &self,
        project_id: Uuid,
        now: i64,
    ) -> Result<(Uuid, SigningKeyPair), SessionError> {
        let record = self
            .store
            .list_active_signing_keys(project_id, now)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::NoActiveSigningKey(PROJECT.format(project_id)))?;

        let private_key = self.kms.decrypt(&record.private_key_ciphertext).await?;
        let pair = SigningKeyPair::from_pkcs8_der(&private_key)?;

        debug!(
            project_id = %PROJECT.format(project_id),
            kid = %SESSION_SIGNING_KEY.format(record.id),
            "Decrypted session signing key"
        );

        Ok((record.id, pair))
    }
}
