//! Shared fixtures for unit tests.

#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use portier_kms::testutil::LocalKeyProtector;
use portier_storage_sqlite::SqliteStore;
use tempfile::TempDir;
use uuid::Uuid;

use crate::projects::{ConsoleProject, ConsoleProjectRequest, ProjectProvisioner, ProjectRequest};
use crate::signing_keys::{SigningKeyManager, SigningKeyPolicy};
use crate::token::{SessionTokens, TokenConfig};

/// Fixed clock used by the fixtures: 2023-11-14T22:13:20Z.
pub(crate) const NOW: i64 = 1_700_000_000;

pub(crate) struct Fixture {
    _tmp: TempDir,
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) kms: Arc<LocalKeyProtector>,
    pub(crate) keys: SigningKeyManager,
    pub(crate) provisioner: ProjectProvisioner,
    pub(crate) tokens: SessionTokens,
    pub(crate) console: ConsoleProject,
}

impl Fixture {
    /// Provisions a tenant project under the console and returns its id.
    pub(crate) async fn provision_project(&self, vault_domain: &str) -> Uuid {
        self.provisioner
            .create_project_at(
                &ProjectRequest {
                    console_project_id: self.console.project_id,
                    display_name: vault_domain.to_string(),
                    vault_domain: vault_domain.to_string(),
                },
                NOW,
            )
            .await
            .unwrap()
            .project_id
    }
}

pub(crate) async fn empty_store() -> (TempDir, Arc<SqliteStore>, Arc<LocalKeyProtector>) {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(tmp.path()).await.unwrap());
    (tmp, store, Arc::new(LocalKeyProtector::new()))
}

/// A store holding a bootstrapped console project.
pub(crate) async fn fixture() -> Fixture {
    let (tmp, store, kms) = empty_store().await;
    let keys = SigningKeyManager::new(store.clone(), kms.clone(), SigningKeyPolicy::default());
    let provisioner = ProjectProvisioner::new(keys.clone());
    let tokens = SessionTokens::new(keys.clone(), TokenConfig::default());

    let console = provisioner
        .create_console_project_at(
            &ConsoleProjectRequest {
                root_user_email: "root@example.com".to_string(),
                console_domain: "example.com".to_string(),
                vault_domain: "vault.example.com".to_string(),
            },
            NOW,
        )
        .await
        .unwrap();

    Fixture {
        _tmp: tmp,
        store,
        kms,
        keys,
        provisioner,
        tokens,
        console,
    }
}
