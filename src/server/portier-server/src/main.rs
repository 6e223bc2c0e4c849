//! Portier Server - Main entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use portier_api::ApiState;
use portier_auth::{BackendApiKeys, ConsoleSessionBackend, RequestAuthenticator};
use portier_ids::PROJECT;
use portier_kms::{Kms, KmsConfig};
use portier_session::{SessionTokens, SigningKeyManager, SigningKeyPolicy, TokenConfig};
use portier_storage::IdentityStore;
use portier_storage_sqlite::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portier-server")]
#[command(about = "Portier - multi-tenant authentication core")]
#[command(version)]
struct Cli {
    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "PORTIER_DATA_DIR")]
    data_dir: PathBuf,

    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8300", env = "PORTIER_BIND_ADDRESS")]
    bind: String,

    /// Formatted id of the console project, as printed by `portierctl bootstrap`
    #[arg(long, env = "PORTIER_CONSOLE_PROJECT_ID")]
    console_project_id: String,

    /// Root domain of session token audiences
    #[arg(long, default_value = "portier.app", env = "PORTIER_AUTH_APPS_ROOT_DOMAIN")]
    auth_apps_root_domain: String,

    /// Lifetime of issued session access tokens
    #[arg(long, default_value_t = 300, env = "PORTIER_ACCESS_TOKEN_TTL_SECS")]
    access_token_ttl_secs: u64,

    /// Key protector backend for session signing keys: aws_kms_v1 or gcp_kms_v1
    #[arg(long, env = "PORTIER_SESSION_SIGNING_KEYS_KMS_BACKEND")]
    session_signing_keys_kms_backend: String,

    /// AWS KMS key id
    #[arg(long, env = "PORTIER_SESSION_SIGNING_KEYS_KMS_AWS_KMS_V1_KEY_ID")]
    session_signing_keys_kms_aws_kms_v1_key_id: Option<String>,

    /// AWS KMS endpoint override
    #[arg(long, env = "PORTIER_SESSION_SIGNING_KEYS_KMS_AWS_KMS_V1_BASE_ENDPOINT")]
    session_signing_keys_kms_aws_kms_v1_base_endpoint: Option<String>,

    /// GCP KMS crypto key name
    #[arg(long, env = "PORTIER_SESSION_SIGNING_KEYS_KMS_GCP_KMS_V1_KEY_NAME")]
    session_signing_keys_kms_gcp_kms_v1_key_name: Option<String>,

    /// GCP KMS endpoint override
    #[arg(long, env = "PORTIER_SESSION_SIGNING_KEYS_KMS_GCP_KMS_V1_BASE_ENDPOINT")]
    session_signing_keys_kms_gcp_kms_v1_base_endpoint: Option<String>,
}

impl Cli {
    fn kms_config(&self) -> anyhow::Result<KmsConfig> {
        KmsConfig::from_flags(
            &self.session_signing_keys_kms_backend,
            self.session_signing_keys_kms_aws_kms_v1_key_id.as_deref(),
            self.session_signing_keys_kms_aws_kms_v1_base_endpoint.as_deref(),
            self.session_signing_keys_kms_gcp_kms_v1_key_name.as_deref(),
            self.session_signing_keys_kms_gcp_kms_v1_base_endpoint.as_deref(),
        )
        .context("invalid session signing key KMS configuration")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let console_project_id = PROJECT
        .parse(&cli.console_project_id)
        .context("invalid --console-project-id")?;

    tracing::info!("Starting Portier server...");
    tracing::info!(data_dir = %cli.data_dir.display(), bind = %cli.bind, "Configuration loaded");

    let kms_config = cli.kms_config()?;
    let backend = kms_config.backend();
    let kms = Kms::new(kms_config)
        .await
        .context("failed to build session signing key KMS client")?;
    tracing::info!(backend = %backend, "Session signing key KMS ready");

    let store = Arc::new(
        SqliteStore::open(&cli.data_dir)
            .await
            .context("failed to open database")?,
    );
    store
        .get_project(console_project_id)
        .await
        .context("console project not found; run `portierctl bootstrap` first")?;

    let keys = SigningKeyManager::new(store.clone(), Arc::new(kms), SigningKeyPolicy::default());
    let tokens = SessionTokens::new(
        keys.clone(),
        TokenConfig {
            audience_root_domain: cli.auth_apps_root_domain.clone(),
            access_token_ttl: Duration::from_secs(cli.access_token_ttl_secs),
            ..TokenConfig::default()
        },
    );

    let authenticator = RequestAuthenticator::new(
        Arc::new(BackendApiKeys::new(store.clone())),
        Arc::new(ConsoleSessionBackend::new(tokens, console_project_id)),
        console_project_id,
    );

    let app = portier_api::router(ApiState {
        authenticator,
        keys,
        store,
        console_project_id,
    });

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    tracing::info!(
        console_project_id = %cli.console_project_id,
        "Portier server listening on {}",
        cli.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await
        .context("server error")?;

    Ok(())
}
