//! Console bootstrap and tenant project provisioning.

use std::fmt;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use portier_crypto::{random, CryptoError};
use portier_ids::{ORGANIZATION, PROJECT};
use portier_storage::{NewConsoleProject, NewProject, NewUser};
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::SessionError;
use crate::signing_keys::SigningKeyManager;
use crate::unix_now;

const CONSOLE_DISPLAY_NAME: &str = "Portier Console";
const BOOTSTRAP_PASSWORD_PREFIX: &str = "this_is_a_very_sensitive_password_";
const BOOTSTRAP_PASSWORD_RANDOM_BYTES: usize = 16;

/// Input of console bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleProjectRequest {
    /// Email of the bootstrap owner.
    pub root_user_email: String,
    /// Console domain, also the console cookie domain.
    pub console_domain: String,
    /// Vault domain; must be the console domain or one of its subdomains.
    pub vault_domain: String,
}

/// Result of console bootstrap.
pub struct ConsoleProject {
    /// Console project id.
    pub project_id: Uuid,
    /// Console organization id. It backs the console project.
    pub organization_id: Uuid,
    /// Bootstrap owner id.
    pub root_user_id: Uuid,
    /// Bootstrap owner email.
    pub root_user_email: String,
    /// One-time bootstrap password. Only its hash is persisted.
    pub root_user_password: Zeroizing<String>,
}

impl fmt::Debug for ConsoleProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleProject")
            .field("project_id", &self.project_id)
            .field("organization_id", &self.organization_id)
            .field("root_user_id", &self.root_user_id)
            .field("root_user_email", &self.root_user_email)
            .field("root_user_password", &"[REDACTED]")
            .finish()
    }
}

/// Input of tenant project creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRequest {
    /// The console project the managing organization lives in.
    pub console_project_id: Uuid,
    /// Display name of the project and its managing organization.
    pub display_name: String,
    /// Vault domain of the new project.
    pub vault_domain: String,
}

/// Result of tenant project creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedProject {
    /// New project id.
    pub project_id: Uuid,
    /// Managing organization id. It backs the new project.
    pub organization_id: Uuid,
}

/// Creates projects together with their first signing key.
///
/// The signing key is generated and encrypted before anything is written, so
/// a key-protector failure leaves the store untouched.
#[derive(Clone)]
pub struct ProjectProvisioner {
    keys: SigningKeyManager,
}

impl ProjectProvisioner {
    /// Creates a provisioner that generates keys with `keys`.
    pub fn new(keys: SigningKeyManager) -> Self {
        Self { keys }
    }

    /// Bootstraps the console project, its organization and owner.
    ///
    /// Fails with a storage error if any project already exists.
    pub async fn create_console_project(
        &self,
        req: &ConsoleProjectRequest,
    ) -> Result<ConsoleProject, SessionError> {
        self.create_console_project_at(req, unix_now()).await
    }

    /// [`create_console_project`](Self::create_console_project) with an
    /// explicit clock.
    pub async fn create_console_project_at(
        &self,
        req: &ConsoleProjectRequest,
        now: i64,
    ) -> Result<ConsoleProject, SessionError> {
        non_empty("root user email", &req.root_user_email)?;
        non_empty("console domain", &req.console_domain)?;
        non_empty("vault domain", &req.vault_domain)?;
        if !is_same_or_subdomain(&req.vault_domain, &req.console_domain) {
            return Err(SessionError::InvalidInput(format!(
                "vault domain {} must be a subdomain of console domain {}",
                req.vault_domain, req.console_domain
            )));
        }

        let project_id = Uuid::new_v4();
        let organization_id = Uuid::new_v4();
        let root_user_id = Uuid::new_v4();

        let password = {
            let suffix = random::generate_hex(BOOTSTRAP_PASSWORD_RANDOM_BYTES);
            Zeroizing::new(format!("{BOOTSTRAP_PASSWORD_PREFIX}{}", suffix.as_str()))
        };
        let password_hash = hash_password(&password)?;

        let signing_key = self.keys.generate(project_id, now).await?;

        self.keys
            .store()
            .create_console_project(&NewConsoleProject {
                project_id,
                organization_id,
                display_name: CONSOLE_DISPLAY_NAME.to_string(),
                console_domain: req.console_domain.clone(),
                vault_domain: req.vault_domain.clone(),
                owner: NewUser {
                    id: root_user_id,
                    email: req.root_user_email.clone(),
                    password_hash: Some(password_hash),
                    is_owner: true,
                },
                signing_key,
                created_at: now,
            })
            .await?;

        info!(
            project_id = %PROJECT.format(project_id),
            console_domain = %req.console_domain,
            vault_domain = %req.vault_domain,
            "Bootstrapped console project"
        );

        Ok(ConsoleProject {
            project_id,
            organization_id,
            root_user_id,
            root_user_email: req.root_user_email.clone(),
            root_user_password: password,
        })
    }

    /// Creates a tenant project managed from the console project.
    pub async fn create_project(&self, req: &ProjectRequest) -> Result<CreatedProject, SessionError> {
        self.create_project_at(req, unix_now()).await
    }

    /// [`create_project`](Self::create_project) with an explicit clock.
    pub async fn create_project_at(
        &self,
        req: &ProjectRequest,
        now: i64,
    ) -> Result<CreatedProject, SessionError> {
        non_empty("display name", &req.display_name)?;
        non_empty("vault domain", &req.vault_domain)?;

        let project_id = Uuid::new_v4();
        let organization_id = Uuid::new_v4();
        let signing_key = self.keys.generate(project_id, now).await?;

        self.keys
            .store()
            .create_project(&NewProject {
                project_id,
                console_project_id: req.console_project_id,
                organization_id,
                display_name: req.display_name.clone(),
                vault_domain: req.vault_domain.clone(),
                signing_key,
                created_at: now,
            })
            .await?;

        info!(
            project_id = %PROJECT.format(project_id),
            organization_id = %ORGANIZATION.format(organization_id),
            "Provisioned project"
        );

        Ok(CreatedProject {
            project_id,
            organization_id,
        })
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), SessionError> {
    if value.trim().is_empty() {
        return Err(SessionError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn is_same_or_subdomain(domain: &str, parent: &str) -> bool {
    domain == parent
        || domain
            .strip_suffix(parent)
            .is_some_and(|rest| rest.ends_with('.') && rest.len() > 1)
}

fn hash_password(password: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SessionError::Crypto(CryptoError::EncodingFailed(format!("hash password: {e}"))))
}
