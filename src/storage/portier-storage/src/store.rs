//! Identity store trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{
    BackendApiKeyRecord, NewBackendApiKey, NewConsoleProject, NewProject, NewSigningKey, Project,
    ProjectUpdate, SigningKeyRecord,
};

/// Transactional store behind the authentication core.
///
/// Every method is a single unit of work: multi-row writes either commit as
/// a whole or leave nothing behind.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Creates the console project with its organization, owner and first
    /// signing key.
    ///
    /// Fails with [`StorageError::PreconditionFailed`] or
    /// [`StorageError::AlreadyExists`] when any project already exists.
    async fn create_console_project(&self, req: &NewConsoleProject) -> Result<(), StorageError>;

    /// Creates a tenant project, its managing organization inside the console
    /// project, and its first signing key.
    async fn create_project(&self, req: &NewProject) -> Result<(), StorageError>;

    /// Loads a project.
    async fn get_project(&self, project_id: Uuid) -> Result<Project, StorageError>;

    /// Applies a partial update and returns the updated project.
    async fn update_project(&self, update: &ProjectUpdate) -> Result<Project, StorageError>;

    /// Adds a signing key to an existing project.
    async fn create_signing_key(&self, key: &NewSigningKey) -> Result<(), StorageError>;

    /// Lists keys with `expires_at > now`, latest expiry first.
    async fn list_active_signing_keys(
        &self,
        project_id: Uuid,
        now: i64,
    ) -> Result<Vec<SigningKeyRecord>, StorageError>;

    /// Persists a backend API key.
    async fn create_backend_api_key(
        &self,
        key: &NewBackendApiKey,
    ) -> Result<BackendApiKeyRecord, StorageError>;

    /// Looks up a backend API key by the digest of its secret.
    async fn get_backend_api_key_by_secret_hash(
        &self,
        secret_sha256: &[u8],
    ) -> Result<Option<BackendApiKeyRecord>, StorageError>;

    /// Marks a backend API key as revoked.
    async fn revoke_backend_api_key(
        &self,
        project_id: Uuid,
        backend_api_key_id: Uuid,
    ) -> Result<(), StorageError>;

    /// Returns the project that `organization_id` backs.
    ///
    /// Fails with [`StorageError::NotFound`] when the organization backs no
    /// project.
    async fn get_project_id_organization_backs(
        &self,
        organization_id: Uuid,
    ) -> Result<Uuid, StorageError>;

    /// Atomically increments and returns a project's email count for `day`
    /// (days since the Unix epoch, UTC).
    async fn increment_email_daily_quota_usage(
        &self,
        project_id: Uuid,
        day: i64,
    ) -> Result<u32, StorageError>;
}
