//! Portier CLI - operator command line interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use portier_auth::BackendApiKeys;
use portier_ids::{BACKEND_API_KEY, PROJECT};
use portier_kms::{Kms, KmsConfig};
use portier_session::{
    ConsoleProjectRequest, ProjectProvisioner, ProjectRequest, SigningKeyManager, SigningKeyPolicy,
};
use portier_storage::{IdentityStore, ProjectUpdate};
use portier_storage_sqlite::SqliteStore;
use reqwest::Client;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "portierctl")]
#[command(about = "Portier operator CLI - bootstrap and manage projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "PORTIER_DATA_DIR")]
    data_dir: PathBuf,
}

#[derive(Args)]
struct KmsArgs {
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

impl KmsArgs {
    async fn build(&self) -> Result<Kms> {
        let config = KmsConfig::from_flags(
            &self.session_signing_keys_kms_backend,
            self.session_signing_keys_kms_aws_kms_v1_key_id.as_deref(),
            self.session_signing_keys_kms_aws_kms_v1_base_endpoint.as_deref(),
            self.session_signing_keys_kms_gcp_kms_v1_key_name.as_deref(),
            self.session_signing_keys_kms_gcp_kms_v1_base_endpoint.as_deref(),
        )
        .context("Invalid session signing key KMS configuration")?;
        Kms::new(config)
            .await
            .context("Failed to build session signing key KMS client")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the console project, its organization and root user
    Bootstrap {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        kms: KmsArgs,
        /// Console domain, also the console cookie domain
        #[arg(long)]
        console_domain: String,
        /// Vault domain, the console domain or a subdomain of it
        #[arg(long)]
        vault_domain: String,
        /// Email of the root user
        #[arg(long)]
        root_user_email: String,
    },
    /// Create a tenant project managed from the console
    CreateProject {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        kms: KmsArgs,
        /// Formatted console project id
        #[arg(long, env = "PORTIER_CONSOLE_PROJECT_ID")]
        console_project_id: String,
        /// Display name
        #[arg(long)]
        display_name: String,
        /// Vault domain
        #[arg(long)]
        vault_domain: String,
    },
    /// Update project settings; empty values leave a field unchanged
    UpdateProject {
        #[command(flatten)]
        store: StoreArgs,
        /// Formatted project id
        project_id: String,
        #[arg(long, default_value = "")]
        vault_domain: String,
        #[arg(long, default_value = "")]
        logo_url: String,
        #[arg(long, default_value = "")]
        dark_mode_logo_url: String,
    },
    /// Create a backend API key and print its secret once
    CreateBackendApiKey {
        #[command(flatten)]
        store: StoreArgs,
        /// Formatted project id
        project_id: String,
        #[arg(long, default_value = "")]
        display_name: String,
        /// Restrict the key to authentication procedures
        #[arg(long)]
        authentication_only: bool,
    },
    /// Revoke a backend API key
    RevokeBackendApiKey {
        #[command(flatten)]
        store: StoreArgs,
        /// Formatted project id
        project_id: String,
        /// Formatted backend API key id
        backend_api_key_id: String,
    },
    /// Check a running server
    Status {
        /// Portier server address
        #[arg(long, default_value = "http://localhost:8300", env = "PORTIER_ADDR")]
        addr: String,
    },
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn open_store(store: &StoreArgs) -> Result<Arc<SqliteStore>> {
    let path: &Path = &store.data_dir;
    let store = SqliteStore::open(path)
        .await
        .with_context(|| format!("Failed to open database in {}", path.display()))?;
    Ok(Arc::new(store))
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_secs() as i64
}

async fn cmd_bootstrap(
    store: &StoreArgs,
    kms: &KmsArgs,
    console_domain: String,
    vault_domain: String,
    root_user_email: String,
) -> Result<()> {
    let kms = kms.build().await?;
    let store = open_store(store).await?;
    let provisioner = ProjectProvisioner::new(SigningKeyManager::new(
        store,
        Arc::new(kms),
        SigningKeyPolicy::default(),
    ));

    let console = provisioner
        .create_console_project(&ConsoleProjectRequest {
            root_user_email,
            console_domain,
            vault_domain,
        })
        .await
        .context("Bootstrap failed")?;

    println!(
        "{}\t{}\t{}",
        PROJECT.format(console.project_id),
        console.root_user_email,
        console.root_user_password.as_str()
    );
    Ok(())
}

async fn cmd_create_project(
    store: &StoreArgs,
    kms: &KmsArgs,
    console_project_id: &str,
    display_name: String,
    vault_domain: String,
) -> Result<()> {
    let console_project_id = PROJECT
        .parse(console_project_id)
        .context("Invalid console project id")?;
    let kms = kms.build().await?;
    let store = open_store(store).await?;
    let provisioner = ProjectProvisioner::new(SigningKeyManager::new(
        store,
        Arc::new(kms),
        SigningKeyPolicy::default(),
    ));

    let created = provisioner
        .create_project(&ProjectRequest {
            console_project_id,
            display_name,
            vault_domain,
        })
        .await
        .context("Create project failed")?;

    println!("{}", PROJECT.format(created.project_id));
    Ok(())
}

async fn cmd_update_project(
    store: &StoreArgs,
    project_id: &str,
    vault_domain: String,
    logo_url: String,
    dark_mode_logo_url: String,
) -> Result<()> {
    let project_id = PROJECT.parse(project_id).context("Invalid project id")?;
    let store = open_store(store).await?;

    let project = store
        .update_project(&ProjectUpdate {
            project_id,
            vault_domain: non_empty(vault_domain),
            logo_url: non_empty(logo_url),
            dark_mode_logo_url: non_empty(dark_mode_logo_url),
        })
        .await
        .context("Update project failed")?;

    println!("Project {} updated:", PROJECT.format(project.id));
    println!("  Vault domain:       {}", project.vault_domain);
    println!("  Logo URL:           {}", project.logo_url.unwrap_or_default());
    println!("  Dark mode logo URL: {}", project.dark_mode_logo_url.unwrap_or_default());
    Ok(())
}

async fn cmd_create_backend_api_key(
    store: &StoreArgs,
    project_id: &str,
    display_name: &str,
    authentication_only: bool,
) -> Result<()> {
    let project_id = PROJECT.parse(project_id).context("Invalid project id")?;
    let store = open_store(store).await?;
    store
        .get_project(project_id)
        .await
        .context("Project not found")?;

    let created = BackendApiKeys::new(store)
        .create(project_id, display_name, authentication_only, unix_now())
        .await
        .context("Create backend API key failed")?;

    println!(
        "{}\t{}",
        BACKEND_API_KEY.format(created.record.id),
        created.secret.as_str()
    );
    Ok(())
}

async fn cmd_revoke_backend_api_key(
    store: &StoreArgs,
    project_id: &str,
    backend_api_key_id: &str,
) -> Result<()> {
    let project_id = PROJECT.parse(project_id).context("Invalid project id")?;
    let backend_api_key_id = BACKEND_API_KEY
        .parse(backend_api_key_id)
        .context("Invalid backend API key id")?;
    let store = open_store(store).await?;

    BackendApiKeys::new(store)
        .revoke(project_id, backend_api_key_id)
        .await
        .context("Revoke backend API key failed")?;

    println!("Backend API key {} revoked", BACKEND_API_KEY.format(backend_api_key_id));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

async fn cmd_status(addr: &str) -> Result<()> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;

    let resp = client
        .get(format!("{}/health", addr.trim_end_matches('/')))
        .send()
        .await
        .context("Failed to connect to server")?;

    if !resp.status().is_success() {
        bail!("Server error: HTTP {}", resp.status());
    }
    let health: HealthResponse = resp.json().await.context("Failed to parse response")?;

    println!("Portier server status: {}", health.status);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bootstrap {
            store,
            kms,
            console_domain,
            vault_domain,
            root_user_email,
        } => cmd_bootstrap(&store, &kms, console_domain, vault_domain, root_user_email).await,
        Commands::CreateProject {
            store,
            kms,
            console_project_id,
            display_name,
            vault_domain,
        } => {
            cmd_create_project(&store, &kms, &console_project_id, display_name, vault_domain).await
        }
        Commands::UpdateProject {
            store,
            project_id,
            vault_domain,
            logo_url,
            dark_mode_logo_url,
        } => {
            cmd_update_project(&store, &project_id, vault_domain, logo_url, dark_mode_logo_url)
                .await
        }
        Commands::CreateBackendApiKey {
            store,
            project_id,
            display_name,
            authentication_only,
        } => {
            cmd_create_backend_api_key(&store, &project_id, &display_name, authentication_only)
                .await
        }
        Commands::RevokeBackendApiKey {
            store,
            project_id,
            backend_api_key_id,
        } => cmd_revoke_backend_api_key(&store, &project_id, &backend_api_key_id).await,
        Commands::Status { addr } => cmd_status(&addr).await,
    }
}
