//! Integration tests for the Portier authentication core.
//!
//! The full router runs in process over a temporary SQLite database with a
//! local key protector, and requests go through `tower::ServiceExt::oneshot`.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use portier_api::{ApiState, BACKEND_SERVICE};
use portier_auth::{BackendApiKeys, ConsoleSessionBackend, RequestAuthenticator};
use portier_kms::testutil::LocalKeyProtector;
use portier_session::{
    ConsoleProject, ConsoleProjectRequest, ProjectProvisioner, SessionTokens, SigningKeyManager,
    SigningKeyPolicy, TokenConfig,
};
use portier_storage_sqlite::SqliteStore;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// Test App
// ============================================================================

/// A bootstrapped deployment behind the full router.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub keys: SigningKeyManager,
    pub provisioner: ProjectProvisioner,
    pub tokens: SessionTokens,
    pub api_keys: BackendApiKeys,
    pub console: ConsoleProject,
    _data_dir: TempDir,
}

impl TestApp {
    /// Bootstraps a console project and builds the router around it.
    pub async fn start() -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let store = Arc::new(
            SqliteStore::open(data_dir.path())
                .await
                .context("Failed to open store")?,
        );
        let keys = SigningKeyManager::new(
            store.clone(),
            Arc::new(LocalKeyProtector::new()),
            SigningKeyPolicy::default(),
        );
        let provisioner = ProjectProvisioner::new(keys.clone());
        let console = provisioner
            .create_console_project(&ConsoleProjectRequest {
                root_user_email: "root@example.com".to_string(),
                console_domain: "console.example.com".to_string(),
                vault_domain: "vault.console.example.com".to_string(),
            })
            .await
            .context("Bootstrap failed")?;

        let tokens = SessionTokens::new(keys.clone(), TokenConfig::default());
        let api_keys = BackendApiKeys::new(store.clone());
        let authenticator = RequestAuthenticator::new(
            Arc::new(api_keys.clone()),
            Arc::new(ConsoleSessionBackend::new(tokens.clone(), console.project_id)),
            console.project_id,
        );

        let router = portier_api::router(ApiState {
            authenticator,
            keys: keys.clone(),
            store: store.clone(),
            console_project_id: console.project_id,
        });

        Ok(Self {
            router,
            store,
            keys,
            provisioner,
            tokens,
            api_keys,
            console,
            _data_dir: data_dir,
        })
    }

    /// Name of the console session cookie.
    pub fn cookie_name(&self) -> String {
        RequestAuthenticator::cookie_name(self.console.project_id)
    }

    /// Sends a request and returns the status and JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Calls a backend RPC with extra headers.
    pub async fn rpc(&self, method: &str, headers: &[(&str, String)]) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("{BACKEND_SERVICE}/{method}"))
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        self.send(builder.body(Body::from("{}")).unwrap()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use portier_ids::{BACKEND_API_KEY, PROJECT};
    use portier_session::{ProjectRequest, SessionSubject};
    use portier_storage::{IdentityStore, StorageError};
    use uuid::Uuid;

    use super::*;

    fn bearer(secret: &str) -> (&'static str, String) {
        ("authorization", format!("Bearer {secret}"))
    }

    fn cookie(value: String) -> (&'static str, String) {
        ("cookie", value)
    }

    fn unix_now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    async fn console_session(app: &TestApp, organization_id: Uuid) -> String {
        app.tokens
            .issue(&SessionSubject {
                project_id: app.console.project_id,
                organization_id,
                user_id: app.console.root_user_id,
                session_id: Uuid::new_v4(),
                user_email: Some(app.console.root_user_email.clone()),
                organization_display_name: None,
            })
            .await
            .unwrap()
            .access_token
    }

    async fn tenant(app: &TestApp, name: &str) -> portier_session::CreatedProject {
        app.provisioner
            .create_project(&ProjectRequest {
                console_project_id: app.console.project_id,
                display_name: name.to_string(),
                vault_domain: format!("{}.vault.example.com", name.to_lowercase()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_skip_list_procedure_is_public() {
        let app = TestApp::start().await.unwrap();

        let (status, body) = app.rpc("ConsoleGetConfiguration", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["consoleProjectId"],
            PROJECT.format(app.console.project_id)
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let app = TestApp::start().await.unwrap();

        let (status, body) = app.rpc("GetProject", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_procedure_not_found() {
        let app = TestApp::start().await.unwrap();
        let (status, _) = app.rpc("DeleteEverything", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_key_reads_its_project() {
        let app = TestApp::start().await.unwrap();
        let project = tenant(&app, "Acme").await;
        let key = app
            .api_keys
            .create(project.project_id, "ci", false, unix_now())
            .await
            .unwrap();

        let (status, body) = app.rpc("GetProject", &[bearer(&key.secret)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project"]["id"], PROJECT.format(project.project_id));
        assert_eq!(body["project"]["displayName"], "Acme");
    }

    #[tokio::test]
    async fn test_authentication_only_key_allow_list() {
        let app = TestApp::start().await.unwrap();
        let key = app
            .api_keys
            .create(app.console.project_id, "login", true, unix_now())
            .await
            .unwrap();

        let (status, body) = app.rpc("GetProject", &[bearer(&key.secret)]).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "permission_denied");

        let (status, body) = app.rpc("AuthenticateApiKey", &[bearer(&key.secret)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backendApiKeyId"], BACKEND_API_KEY.format(key.record.id));
        assert_eq!(body["projectId"], PROJECT.format(app.console.project_id));
        assert!(body.get("sessionId").is_none());
    }

    #[tokio::test]
    async fn test_revoked_key_rejected() {
        let app = TestApp::start().await.unwrap();
        let key = app
            .api_keys
            .create(app.console.project_id, "ci", false, unix_now())
            .await
            .unwrap();
        app.api_keys
            .revoke(app.console.project_id, key.record.id)
            .await
            .unwrap();

        let (status, _) = app.rpc("GetProject", &[bearer(&key.secret)]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_cookie_in_second_cookie_header() {
        let app = TestApp::start().await.unwrap();
        let token = console_session(&app, app.console.organization_id).await;

        let (status, body) = app
            .rpc(
                "GetProject",
                &[
                    cookie("theme=dark; lang=en".to_string()),
                    cookie(format!("{}={token}", app.cookie_name())),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project"]["id"], PROJECT.format(app.console.project_id));
    }

    #[tokio::test]
    async fn test_console_session_operates_on_backed_project() {
        let app = TestApp::start().await.unwrap();
        let project = tenant(&app, "Acme").await;
        let token = console_session(&app, project.organization_id).await;

        let (status, body) = app
            .rpc(
                "GetProject",
                &[cookie(format!("{}={token}", app.cookie_name()))],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["project"]["id"], PROJECT.format(project.project_id));

        let (status, body) = app
            .rpc(
                "AuthenticateApiKey",
                &[cookie(format!("{}={token}", app.cookie_name()))],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projectId"], PROJECT.format(project.project_id));
        assert_eq!(body["userId"], portier_ids::USER.format(app.console.root_user_id));
        let session_id = body["sessionId"].as_str().unwrap();
        assert!(portier_ids::SESSION.parse(session_id).is_ok(), "{session_id}");
        assert!(body.get("backendApiKeyId").is_none());
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let app = TestApp::start().await.unwrap();
        let issued = app
            .tokens
            .issue_at(
                &SessionSubject {
                    project_id: app.console.project_id,
                    organization_id: app.console.organization_id,
                    user_id: app.console.root_user_id,
                    session_id: Uuid::new_v4(),
                    user_email: None,
                    organization_display_name: None,
                },
                unix_now() - 600,
            )
            .await
            .unwrap();

        let (status, _) = app
            .rpc(
                "GetProject",
                &[cookie(format!("{}={}", app.cookie_name(), issued.access_token))],
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tenant_signed_token_rejected_as_console_session() {
        let app = TestApp::start().await.unwrap();
        let project = tenant(&app, "Acme").await;

        // Valid for the tenant project, but the cookie path verifies against
        // the console project's keys and audience.
        let issued = app
            .tokens
            .issue(&SessionSubject {
                project_id: project.project_id,
                organization_id: project.organization_id,
                user_id: Uuid::new_v4(),
                session_id: Uuid::new_v4(),
                user_email: None,
                organization_display_name: None,
            })
            .await
            .unwrap();
        assert!(app
            .tokens
            .verify(project.project_id, &issued.access_token)
            .await
            .is_ok());

        let (status, _) = app
            .rpc(
                "GetProject",
                &[cookie(format!("{}={}", app.cookie_name(), issued.access_token))],
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_header_takes_precedence_over_cookie() {
        let app = TestApp::start().await.unwrap();
        let token = console_session(&app, app.console.organization_id).await;

        let (status, _) = app
            .rpc(
                "GetProject",
                &[
                    bearer("portier_secret_key_unknown"),
                    cookie(format!("{}={token}", app.cookie_name())),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_published_keys_follow_rotation() {
        let app = TestApp::start().await.unwrap();
        let uri = format!(
            "/v1/projects/{}/session-public-keys",
            PROJECT.format(app.console.project_id)
        );
        let get = || Request::builder().uri(&uri).body(Body::empty()).unwrap();

        let (status, body) = app.send(get()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["keys"].as_array().unwrap().len(), 1);

        let rotated = SigningKeyManager::new(
            app.store.clone(),
            Arc::new(LocalKeyProtector::new()),
            SigningKeyPolicy {
                lifetime: Duration::from_secs(2 * 365 * 24 * 60 * 60),
            },
        )
        .create_signing_key(app.console.project_id)
        .await
        .unwrap();

        let (_, body) = app.send(get()).await;
        let keys = body["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["kid"], rotated.kid());

        let published = app.keys.active_public_keys(app.console.project_id).await.unwrap();
        assert_eq!(published.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_bootstrap_commits_once() {
        let data_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(data_dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..2 {
            let provisioner = ProjectProvisioner::new(SigningKeyManager::new(
                store.clone(),
                Arc::new(LocalKeyProtector::new()),
                SigningKeyPolicy::default(),
            ));
            handles.push(tokio::spawn(async move {
                provisioner
                    .create_console_project(&ConsoleProjectRequest {
                        root_user_email: format!("root{i}@example.com"),
                        console_domain: "console.example.com".to_string(),
                        vault_domain: "vault.console.example.com".to_string(),
                    })
                    .await
            }));
        }

        let mut committed = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(console) => committed.push(console.project_id),
                Err(portier_session::SessionError::Storage(
                    StorageError::PreconditionFailed(_)
                    | StorageError::AlreadyExists(_)
                    | StorageError::Conflict(_),
                )) => {}
                Err(e) => panic!("unexpected bootstrap error: {e}"),
            }
        }
        assert_eq!(committed.len(), 1);

        let console = store.get_project(committed[0]).await.unwrap();
        assert!(console.is_console);
    }
}
