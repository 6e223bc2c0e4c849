//! Shared fixtures for unit tests.

#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use portier_kms::testutil::LocalKeyProtector;
use portier_session::{
    ConsoleProject, ConsoleProjectRequest, CreatedProject, ProjectProvisioner, ProjectRequest,
    SessionTokens, SigningKeyManager, SigningKeyPolicy, TokenConfig,
};
use portier_storage_sqlite::SqliteStore;
use tempfile::TempDir;

use crate::{BackendApiKeys, ConsoleSessionBackend, RequestAuthenticator};

/// Creation time for API keys; lookups do not depend on it.
pub(crate) const NOW: i64 = 1_700_000_000;

pub(crate) struct Fixture {
    _tmp: TempDir,
    pub(crate) console: ConsoleProject,
    pub(crate) provisioner: ProjectProvisioner,
    pub(crate) tokens: SessionTokens,
    pub(crate) api_keys: BackendApiKeys,
    pub(crate) authenticator: RequestAuthenticator,
}

impl Fixture {
    pub(crate) fn cookie_name(&self) -> String {
        RequestAuthenticator::cookie_name(self.console.project_id)
    }

    pub(crate) async fn provision_project(&self) -> CreatedProject {
        self.provisioner
            .create_project(&ProjectRequest {
                console_project_id: self.console.project_id,
                display_name: "Acme".to_string(),
                vault_domain: "acme.vault.example.com".to_string(),
            })
            .await
            .unwrap()
    }
}

/// A store with a console project bootstrapped on the wall clock, so that
/// tokens verified by [`ConsoleSessionBackend`] see live keys.
pub(crate) async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(tmp.path()).await.unwrap());
    let keys = SigningKeyManager::new(
        store.clone(),
        Arc::new(LocalKeyProtector::new()),
        SigningKeyPolicy::default(),
    );
    let provisioner = ProjectProvisioner::new(keys.clone());
    let tokens = SessionTokens::new(keys, TokenConfig::default());

    let console = provisioner
        .create_console_project(&ConsoleProjectRequest {
            root_user_email: "root@example.com".to_string(),
            console_domain: "example.com".to_string(),
            vault_domain: "vault.example.com".to_string(),
        })
        .await
        .unwrap();

    let api_keys = BackendApiKeys::new(store);
    let authenticator = RequestAuthenticator::new(
        Arc::new(api_keys.clone()),
        Arc::new(ConsoleSessionBackend::new(tokens.clone(), console.project_id)),
        console.project_id,
    );

    Fixture {
        _tmp: tmp,
        console,
        provisioner,
        tokens,
        api_keys,
        authenticator,
    }
}
