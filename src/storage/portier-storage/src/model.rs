//! Records persisted by an [`IdentityStore`](crate::IdentityStore).
//!
//! Identifiers are raw UUIDs here. Formatting them for the outside world is
//! the caller's job. Timestamps are Unix seconds.

use std::fmt;

use uuid::Uuid;

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Project id.
    pub id: Uuid,
    /// The organization that backs (manages) this project, if linked.
    pub organization_id: Option<Uuid>,
    /// Whether this is the operating console project.
    pub is_console: bool,
    /// Human readable name.
    pub display_name: String,
    /// Domain hosting the project's login pages.
    pub vault_domain: String,
    /// Domain session cookies are scoped to.
    pub cookie_domain: String,
    /// Light theme logo.
    pub logo_url: Option<String>,
    /// Dark theme logo.
    pub dark_mode_logo_url: Option<String>,
    /// Per-project override of the daily email quota.
    pub email_quota_daily: Option<u32>,
    /// Domains allowed to host flows for this project.
    pub trusted_domains: Vec<String>,
    /// Creation time.
    pub created_at: i64,
}

/// A user created together with a project.
#[derive(Clone)]
pub struct NewUser {
    /// User id.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// PHC-formatted password hash.
    pub password_hash: Option<String>,
    /// Whether the user owns its organization.
    pub is_owner: bool,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[REDACTED]"))
            .field("is_owner", &self.is_owner)
            .finish()
    }
}

/// A session signing key ready to be persisted.
#[derive(Clone)]
pub struct NewSigningKey {
    /// Key id, also the token `kid`.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// SubjectPublicKeyInfo DER.
    pub public_key: Vec<u8>,
    /// PKCS#8 private key as encrypted by the key protector.
    pub private_key_ciphertext: Vec<u8>,
    /// Expiry time.
    pub expires_at: i64,
    /// Creation time.
    pub created_at: i64,
}

impl fmt::Debug for NewSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSigningKey")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("private_key_ciphertext", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// A stored session signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKeyRecord {
    /// Key id, also the token `kid`.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// SubjectPublicKeyInfo DER.
    pub public_key: Vec<u8>,
    /// Encrypted PKCS#8 private key.
    pub private_key_ciphertext: Vec<u8>,
    /// Expiry time.
    pub expires_at: i64,
    /// Creation time.
    pub created_at: i64,
}

impl fmt::Debug for SigningKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyRecord")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("private_key_ciphertext", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Everything written by console project bootstrap.
///
/// The console organization backs the console project itself, and the owner
/// user is created inside that organization.
#[derive(Debug, Clone)]
pub struct NewConsoleProject {
    /// Console project id.
    pub project_id: Uuid,
    /// Console organization id.
    pub organization_id: Uuid,
    /// Display name of both the project and the organization.
    pub display_name: String,
    /// Console domain; becomes the cookie domain.
    pub console_domain: String,
    /// Vault domain; a subdomain of the console domain.
    pub vault_domain: String,
    /// Bootstrap owner.
    pub owner: NewUser,
    /// First signing key of the console project.
    pub signing_key: NewSigningKey,
    /// Creation time.
    pub created_at: i64,
}

/// A tenant project managed from the console.
///
/// A managing organization is created inside the console project and linked
/// as the organization backing the new project.
#[derive(Debug, Clone)]
pub struct NewProject {
    /// New project id.
    pub project_id: Uuid,
    /// The console project that owns the managing organization.
    pub console_project_id: Uuid,
    /// Managing organization id.
    pub organization_id: Uuid,
    /// Display name of both the project and the organization.
    pub display_name: String,
    /// Vault domain, also the cookie domain and only trusted domain.
    pub vault_domain: String,
    /// First signing key of the new project.
    pub signing_key: NewSigningKey,
    /// Creation time.
    pub created_at: i64,
}

/// A partial project update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    /// Project to update.
    pub project_id: Uuid,
    /// New vault domain.
    pub vault_domain: Option<String>,
    /// New light theme logo.
    pub logo_url: Option<String>,
    /// New dark theme logo.
    pub dark_mode_logo_url: Option<String>,
}

/// A backend API key ready to be persisted.
#[derive(Clone)]
pub struct NewBackendApiKey {
    /// Key id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// Human readable name.
    pub display_name: String,
    /// SHA-256 of the secret token's raw bytes.
    pub secret_sha256: [u8; 32],
    /// Restricts the key to authentication procedures.
    pub authentication_only: bool,
    /// Creation time.
    pub created_at: i64,
}

impl fmt::Debug for NewBackendApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewBackendApiKey")
            .field("id", &self.id)
            .field("project_id", &self.project_id)
            .field("display_name", &self.display_name)
            .field("secret_sha256", &"[REDACTED]")
            .field("authentication_only", &self.authentication_only)
            .finish()
    }
}

/// A stored backend API key. The secret digest is never read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendApiKeyRecord {
    /// Key id.
    pub id: Uuid,
    /// Owning project.
    pub project_id: Uuid,
    /// Human readable name.
    pub display_name: String,
    /// Restricts the key to authentication procedures.
    pub authentication_only: bool,
    /// Revoked keys never authenticate.
    pub revoked: bool,
    /// Creation time.
    pub created_at: i64,
}
