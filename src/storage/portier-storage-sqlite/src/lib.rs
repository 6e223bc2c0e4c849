//! # Portier Storage - SQLite Backend
//!
//! SQLite implementation of [`IdentityStore`]. All data lives in a single
//! `portier.db` file inside the data directory.
//!
//! Every mutation touching more than one row runs in one transaction that is
//! committed only after the last statement succeeds. Dropping the future of
//! an in-flight call drops the transaction, which rolls it back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use portier_storage::{
    BackendApiKeyRecord, IdentityStore, NewBackendApiKey, NewConsoleProject, NewProject,
    NewSigningKey, Project, ProjectUpdate, SigningKeyRecord, StorageError,
};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "portier.db";

/// SQLite identity store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    organization_id: Option<String>,
    is_console: bool,
    display_name: String,
    vault_domain: String,
    cookie_domain: String,
    logo_url: Option<String>,
    dark_mode_logo_url: Option<String>,
    email_quota_daily: Option<i64>,
    created_at: i64,
}

#[derive(FromRow)]
struct SigningKeyRow {
    id: String,
    project_id: String,
    public_key: Vec<u8>,
    private_key_ciphertext: Vec<u8>,
    expires_at: i64,
    created_at: i64,
}

#[derive(FromRow)]
struct BackendApiKeyRow {
    id: String,
    project_id: String,
    display_name: String,
    authentication_only: bool,
    revoked: bool,
    created_at: i64,
}

impl SqliteStore {
    /// Opens or creates the database in `data_dir` and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the database
    /// cannot be opened, or a migration fails.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base = data_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(DATABASE_FILE);
        debug!(path = %db_path.display(), "Opening SQLite database");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool, db_path };
        store.migrate().await?;

        info!(path = %store.db_path.display(), "SQLite store ready");

        Ok(store)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        for statement in schema::MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        debug!("Migrations complete");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        self.pool.begin().await.map_err(transaction_error)
    }

    async fn insert_signing_key(
        tx: &mut Transaction<'static, Sqlite>,
        key: &NewSigningKey,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO session_signing_keys
                (id, project_id, public_key, private_key_ciphertext, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.id.to_string())
        .bind(key.project_id.to_string())
        .bind(&key.public_key)
        .bind(&key.private_key_ciphertext)
        .bind(key.expires_at)
        .bind(key.created_at)
        .execute(&mut **tx)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn insert_trusted_domain(
        tx: &mut Transaction<'static, Sqlite>,
        project_id: Uuid,
        domain: &str,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO project_trusted_domains (project_id, domain) VALUES (?, ?)")
            .bind(project_id.to_string())
            .bind(domain)
            .execute(&mut **tx)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn insert_organization(
        tx: &mut Transaction<'static, Sqlite>,
        id: Uuid,
        project_id: Uuid,
        display_name: &str,
        created_at: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO organizations (id, project_id, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(project_id.to_string())
        .bind(display_name)
        .bind(created_at)
        .execute(&mut **tx)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn fetch_project<'e, E>(executor: E, project_id: Uuid) -> Result<Project, StorageError>
    where
        E: sqlx::Executor<'e, Database = Sqlite> + Copy,
    {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, organization_id, is_console, display_name, vault_domain, cookie_domain,
                   logo_url, dark_mode_logo_url, email_quota_daily, created_at
            FROM projects WHERE id = ?
            "#,
        )
        .bind(project_id.to_string())
        .fetch_optional(executor)
        .await
        .map_err(query_error)?;

        let row = row.ok_or_else(|| StorageError::NotFound(format!("project {project_id}")))?;

        let domains: Vec<(String,)> = sqlx::query_as(
            "SELECT domain FROM project_trusted_domains WHERE project_id = ? ORDER BY domain",
        )
        .bind(project_id.to_string())
        .fetch_all(executor)
        .await
        .map_err(query_error)?;

        Ok(Project {
            id: parse_uuid(&row.id)?,
            organization_id: row.organization_id.as_deref().map(parse_uuid).transpose()?,
            is_console: row.is_console,
            display_name: row.display_name,
            vault_domain: row.vault_domain,
            cookie_domain: row.cookie_domain,
            logo_url: row.logo_url,
            dark_mode_logo_url: row.dark_mode_logo_url,
            email_quota_daily: row
                .email_quota_daily
                .map(|q| {
                    u32::try_from(q)
                        .map_err(|_| StorageError::Serialization(format!("email quota {q}")))
                })
                .transpose()?,
            trusted_domains: domains.into_iter().map(|(d,)| d).collect(),
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn create_console_project(&self, req: &NewConsoleProject) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error)?;
        if count != 0 {
            return Err(StorageError::PreconditionFailed(format!(
                "project count is not zero: {count}"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO projects (id, is_console, display_name, vault_domain, cookie_domain, created_at)
            VALUES (?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(req.project_id.to_string())
        .bind(&req.display_name)
        .bind(&req.vault_domain)
        .bind(&req.console_domain)
        .bind(req.created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        for domain in [&req.console_domain, &req.vault_domain] {
            Self::insert_trusted_domain(&mut tx, req.project_id, domain).await?;
        }

        Self::insert_organization(
            &mut tx,
            req.organization_id,
            req.project_id,
            &req.display_name,
            req.created_at,
        )
        .await?;

        // The project and its organization refer to each other.
        sqlx::query("UPDATE projects SET organization_id = ? WHERE id = ?")
            .bind(req.organization_id.to_string())
            .bind(req.project_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, organization_id, email, password_hash, is_owner, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.owner.id.to_string())
        .bind(req.organization_id.to_string())
        .bind(&req.owner.email)
        .bind(req.owner.password_hash.as_deref())
        .bind(req.owner.is_owner)
        .bind(req.created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        Self::insert_signing_key(&mut tx, &req.signing_key).await?;

        tx.commit().await.map_err(transaction_error)?;

        info!(project_id = %req.project_id, "Created console project");
        Ok(())
    }

    async fn create_project(&self, req: &NewProject) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        let console: Option<(bool,)> = sqlx::query_as("SELECT is_console FROM projects WHERE id = ?")
            .bind(req.console_project_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        match console {
            None => {
                return Err(StorageError::NotFound(format!(
                    "project {}",
                    req.console_project_id
                )))
            }
            Some((false,)) => {
                return Err(StorageError::PreconditionFailed(format!(
                    "project {} is not the console project",
                    req.console_project_id
                )))
            }
            Some((true,)) => {}
        }

        Self::insert_organization(
            &mut tx,
            req.organization_id,
            req.console_project_id,
            &req.display_name,
            req.created_at,
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO projects
                (id, organization_id, is_console, display_name, vault_domain, cookie_domain, created_at)
            VALUES (?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(req.project_id.to_string())
        .bind(req.organization_id.to_string())
        .bind(&req.display_name)
        .bind(&req.vault_domain)
        .bind(&req.vault_domain)
        .bind(req.created_at)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        Self::insert_trusted_domain(&mut tx, req.project_id, &req.vault_domain).await?;
        Self::insert_signing_key(&mut tx, &req.signing_key).await?;

        tx.commit().await.map_err(transaction_error)?;

        info!(
            project_id = %req.project_id,
            organization_id = %req.organization_id,
            "Created project"
        );
        Ok(())
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Project, StorageError> {
        Self::fetch_project(&self.pool, project_id).await
    }

    async fn update_project(&self, update: &ProjectUpdate) -> Result<Project, StorageError> {
        let mut tx = self.begin().await?;
        let id = update.project_id.to_string();

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM projects WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        if exists.is_none() {
            return Err(StorageError::NotFound(format!("project {}", update.project_id)));
        }

        let columns = [
            ("vault_domain", &update.vault_domain),
            ("logo_url", &update.logo_url),
            ("dark_mode_logo_url", &update.dark_mode_logo_url),
        ];
        for (column, value) in columns {
            let Some(value) = value else { continue };
            // column names come from the fixed list above
            sqlx::query(&format!("UPDATE projects SET {column} = ? WHERE id = ?"))
                .bind(value)
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        tx.commit().await.map_err(transaction_error)?;

        debug!(project_id = %update.project_id, "Updated project");
        self.get_project(update.project_id).await
    }

    async fn create_signing_key(&self, key: &NewSigningKey) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;
        Self::insert_signing_key(&mut tx, key).await?;
        tx.commit().await.map_err(transaction_error)?;

        debug!(project_id = %key.project_id, key_id = %key.id, "Stored session signing key");
        Ok(())
    }

    async fn list_active_signing_keys(
        &self,
        project_id: Uuid,
        now: i64,
    ) -> Result<Vec<SigningKeyRecord>, StorageError> {
        let rows: Vec<SigningKeyRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, public_key, private_key_ciphertext, expires_at, created_at
            FROM session_signing_keys
            WHERE project_id = ? AND expires_at > ?
            ORDER BY expires_at DESC, created_at DESC
            "#,
        )
        .bind(project_id.to_string())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(SigningKeyRecord {
                    id: parse_uuid(&row.id)?,
                    project_id: parse_uuid(&row.project_id)?,
                    public_key: row.public_key,
                    private_key_ciphertext: row.private_key_ciphertext,
                    expires_at: row.expires_at,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn create_backend_api_key(
        &self,
        key: &NewBackendApiKey,
    ) -> Result<BackendApiKeyRecord, StorageError> {
        sqlx::query(
            r#"
            INSERT INTO backend_api_keys
                (id, project_id, display_name, secret_sha256, authentication_only, revoked, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(key.id.to_string())
        .bind(key.project_id.to_string())
        .bind(&key.display_name)
        .bind(&key.secret_sha256[..])
        .bind(key.authentication_only)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(BackendApiKeyRecord {
            id: key.id,
            project_id: key.project_id,
            display_name: key.display_name.clone(),
            authentication_only: key.authentication_only,
            revoked: false,
            created_at: key.created_at,
        })
    }

    async fn get_backend_api_key_by_secret_hash(
        &self,
        secret_sha256: &[u8],
    ) -> Result<Option<BackendApiKeyRecord>, StorageError> {
        let row: Option<BackendApiKeyRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, display_name, authentication_only, revoked, created_at
            FROM backend_api_keys WHERE secret_sha256 = ?
            "#,
        )
        .bind(secret_sha256)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(|row| {
            Ok(BackendApiKeyRecord {
                id: parse_uuid(&row.id)?,
                project_id: parse_uuid(&row.project_id)?,
                display_name: row.display_name,
                authentication_only: row.authentication_only,
                revoked: row.revoked,
                created_at: row.created_at,
            })
        })
        .transpose()
    }

    async fn revoke_backend_api_key(
        &self,
        project_id: Uuid,
        backend_api_key_id: Uuid,
    ) -> Result<(), StorageError> {
        let result =
            sqlx::query("UPDATE backend_api_keys SET revoked = 1 WHERE project_id = ? AND id = ?")
                .bind(project_id.to_string())
                .bind(backend_api_key_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "backend api key {backend_api_key_id}"
            )));
        }
        Ok(())
    }

    async fn get_project_id_organization_backs(
        &self,
        organization_id: Uuid,
    ) -> Result<Uuid, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM projects WHERE organization_id = ?")
            .bind(organization_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        let (id,) = row.ok_or_else(|| {
            StorageError::NotFound(format!("project backed by organization {organization_id}"))
        })?;
        parse_uuid(&id)
    }

    async fn increment_email_daily_quota_usage(
        &self,
        project_id: Uuid,
        day: i64,
    ) -> Result<u32, StorageError> {
        let (usage,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO project_email_daily_quota_usage (project_id, day, quota_usage)
            VALUES (?, ?, 1)
            ON CONFLICT (project_id, day) DO UPDATE SET quota_usage = quota_usage + 1
            RETURNING quota_usage
            "#,
        )
        .bind(project_id.to_string())
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(query_error)?;

        u32::try_from(usage).map_err(|_| StorageError::Serialization(format!("quota usage {usage}")))
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value).map_err(|e| StorageError::Serialization(format!("uuid {value:?}: {e}")))
}

/// SQLite primary result codes for a held lock.
fn is_busy(code: &str) -> bool {
    matches!(code.parse::<i32>().map(|c| c & 0xff), Ok(5) | Ok(6))
}

fn query_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::AlreadyExists(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound(db.message().to_string());
        }
        if db.code().as_deref().is_some_and(is_busy) {
            warn!(error = %db.message(), "SQLite write conflict");
            return StorageError::Conflict(db.message().to_string());
        }
    }
    StorageError::QueryFailed(e.to_string())
}

fn transaction_error(e: sqlx::Error) -> StorageError {
    match query_error(e) {
        StorageError::QueryFailed(message) => StorageError::Transaction(message),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use std::sync::Arc;

    use portier_storage::NewUser;
    use tempfile::TempDir;

    use super::*;

    const NOW: i64 = 1_700_000_000;
    const YEAR: i64 = 365 * 24 * 60 * 60;

    async fn setup() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(tmp.path()).await.unwrap();
        (tmp, store)
    }

    fn signing_key(project_id: Uuid, expires_at: i64) -> NewSigningKey {
        NewSigningKey {
            id: Uuid::new_v4(),
            project_id,
            public_key: vec![0x30, 0x59],
            private_key_ciphertext: vec![0xEE; 48],
            expires_at,
            created_at: NOW,
        }
    }

    fn console_request() -> NewConsoleProject {
        let project_id = Uuid::new_v4();
        NewConsoleProject {
            project_id,
            organization_id: Uuid::new_v4(),
            display_name: "Portier Console".to_string(),
            console_domain: "console.example.com".to_string(),
            vault_domain: "vault.console.example.com".to_string(),
            owner: NewUser {
                id: Uuid::new_v4(),
                email: "root@example.com".to_string(),
                password_hash: Some("$argon2id$stub".to_string()),
                is_owner: true,
            },
            signing_key: signing_key(project_id, NOW + YEAR),
            created_at: NOW,
        }
    }

    fn project_request(console_project_id: Uuid) -> NewProject {
        let project_id = Uuid::new_v4();
        NewProject {
            project_id,
            console_project_id,
            organization_id: Uuid::new_v4(),
            display_name: "Acme".to_string(),
            vault_domain: "acme.vault.example.com".to_string(),
            signing_key: signing_key(project_id, NOW + YEAR),
            created_at: NOW,
        }
    }

    #[tokio::test]
    async fn test_open_creates_db() {
        let (tmp, store) = setup().await;
        assert!(tmp.path().join(DATABASE_FILE).exists());
        assert_eq!(store.path(), tmp.path().join(DATABASE_FILE));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let req = console_request();
        SqliteStore::open(tmp.path())
            .await
            .unwrap()
            .create_console_project(&req)
            .await
            .unwrap();

        let store = SqliteStore::open(tmp.path()).await.unwrap();
        assert!(store.get_project(req.project_id).await.unwrap().is_console);
    }

    #[tokio::test]
    async fn test_console_project_backs_itself() {
        let (_tmp, store) = setup().await;
        let req = console_request();
        store.create_console_project(&req).await.unwrap();

        let project = store.get_project(req.project_id).await.unwrap();
        assert!(project.is_console);
        assert_eq!(project.organization_id, Some(req.organization_id));
        assert_eq!(project.cookie_domain, "console.example.com");
        assert_eq!(
            project.trusted_domains,
            vec!["console.example.com", "vault.console.example.com"]
        );

        assert_eq!(
            store
                .get_project_id_organization_backs(req.organization_id)
                .await
                .unwrap(),
            req.project_id
        );
    }

    #[tokio::test]
    async fn test_second_console_project_rejected() {
        let (_tmp, store) = setup().await;
        store.create_console_project(&console_request()).await.unwrap();

        let second = console_request();
        let result = store.create_console_project(&second).await;
        assert!(matches!(result, Err(StorageError::PreconditionFailed(_))));
        assert!(matches!(
            store.get_project(second.project_id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_console_bootstrap_commits_once() {
        let (_tmp, store) = setup().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_console_project(&console_request()).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(
                    StorageError::PreconditionFailed(_)
                    | StorageError::AlreadyExists(_)
                    | StorageError::Conflict(_),
                ) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_console_unique_index() {
        let (_tmp, store) = setup().await;
        store.create_console_project(&console_request()).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO projects (id, is_console, display_name, vault_domain, cookie_domain, created_at) VALUES ('x', 1, 'x', 'x', 'x', 0)",
        )
        .execute(&store.pool)
        .await
        .map_err(query_error);
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_project_backed_by_console_organization() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();

        let req = project_request(console.project_id);
        store.create_project(&req).await.unwrap();

        let project = store.get_project(req.project_id).await.unwrap();
        assert!(!project.is_console);
        assert_eq!(project.organization_id, Some(req.organization_id));
        assert_eq!(project.trusted_domains, vec!["acme.vault.example.com"]);

        assert_eq!(
            store
                .get_project_id_organization_backs(req.organization_id)
                .await
                .unwrap(),
            req.project_id
        );
        assert!(matches!(
            store.get_project_id_organization_backs(Uuid::new_v4()).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_project_requires_console_parent() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();
        let tenant = project_request(console.project_id);
        store.create_project(&tenant).await.unwrap();

        assert!(matches!(
            store.create_project(&project_request(tenant.project_id)).await,
            Err(StorageError::PreconditionFailed(_))
        ));
        assert!(matches!(
            store.create_project(&project_request(Uuid::new_v4())).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_project_rolls_back_on_failure() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();

        // Reusing the console key id fails the last insert.
        let mut req = project_request(console.project_id);
        req.signing_key.id = console.signing_key.id;
        assert!(matches!(
            store.create_project(&req).await,
            Err(StorageError::AlreadyExists(_))
        ));

        assert!(matches!(
            store.get_project(req.project_id).await,
            Err(StorageError::NotFound(_))
        ));
        let (orgs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(orgs, 1);
    }

    #[tokio::test]
    async fn test_active_signing_keys_filter_and_order() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        let project_id = console.project_id;
        store.create_console_project(&console).await.unwrap();

        let later = signing_key(project_id, NOW + 2 * YEAR);
        let expired = signing_key(project_id, NOW - 1);
        store.create_signing_key(&later).await.unwrap();
        store.create_signing_key(&expired).await.unwrap();

        let active = store.list_active_signing_keys(project_id, NOW).await.unwrap();
        let ids: Vec<Uuid> = active.iter().map(|k| k.id).collect();
        assert_eq!(ids, vec![later.id, console.signing_key.id]);
        assert_eq!(active[0].private_key_ciphertext, vec![0xEE; 48]);

        // A key is no longer active at its exact expiry time.
        let active = store
            .list_active_signing_keys(project_id, NOW + YEAR)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        assert!(store
            .list_active_signing_keys(Uuid::new_v4(), NOW)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_backend_api_key_lookup_and_revoke() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();

        let key = NewBackendApiKey {
            id: Uuid::new_v4(),
            project_id: console.project_id,
            display_name: "ci".to_string(),
            secret_sha256: [7u8; 32],
            authentication_only: true,
            created_at: NOW,
        };
        let created = store.create_backend_api_key(&key).await.unwrap();

        let found = store
            .get_backend_api_key_by_secret_hash(&[7u8; 32])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, created);
        assert!(found.authentication_only);
        assert!(store
            .get_backend_api_key_by_secret_hash(&[8u8; 32])
            .await
            .unwrap()
            .is_none());

        store
            .revoke_backend_api_key(console.project_id, key.id)
            .await
            .unwrap();
        let found = store
            .get_backend_api_key_by_secret_hash(&[7u8; 32])
            .await
            .unwrap()
            .unwrap();
        assert!(found.revoked);

        assert!(matches!(
            store.revoke_backend_api_key(Uuid::new_v4(), key.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_api_key_constraints() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();

        let key = NewBackendApiKey {
            id: Uuid::new_v4(),
            project_id: console.project_id,
            display_name: "a".to_string(),
            secret_sha256: [1u8; 32],
            authentication_only: false,
            created_at: NOW,
        };
        store.create_backend_api_key(&key).await.unwrap();

        let duplicate = NewBackendApiKey {
            id: Uuid::new_v4(),
            ..key.clone()
        };
        assert!(matches!(
            store.create_backend_api_key(&duplicate).await,
            Err(StorageError::AlreadyExists(_))
        ));

        let orphan = NewBackendApiKey {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            secret_sha256: [2u8; 32],
            ..key
        };
        assert!(matches!(
            store.create_backend_api_key(&orphan).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_project_partial() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();

        let updated = store
            .update_project(&ProjectUpdate {
                project_id: console.project_id,
                logo_url: Some("https://cdn.example.com/logo.png".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.logo_url.as_deref(), Some("https://cdn.example.com/logo.png"));
        assert_eq!(updated.vault_domain, "vault.console.example.com");
        assert_eq!(updated.dark_mode_logo_url, None);

        let updated = store
            .update_project(&ProjectUpdate {
                project_id: console.project_id,
                vault_domain: Some("auth.console.example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.vault_domain, "auth.console.example.com");
        assert!(updated.logo_url.is_some());

        assert!(matches!(
            store
                .update_project(&ProjectUpdate {
                    project_id: Uuid::new_v4(),
                    ..Default::default()
                })
                .await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_email_quota_usage_increments_per_day() {
        let (_tmp, store) = setup().await;
        let console = console_request();
        store.create_console_project(&console).await.unwrap();
        let id = console.project_id;

        assert_eq!(store.increment_email_daily_quota_usage(id, 19_000).await.unwrap(), 1);
        assert_eq!(store.increment_email_daily_quota_usage(id, 19_000).await.unwrap(), 2);
        assert_eq!(store.increment_email_daily_quota_usage(id, 19_001).await.unwrap(), 1);
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy("5"));
        assert!(is_busy("517"));
        assert!(is_busy("6"));
        assert!(!is_busy("2067"));
        assert!(!is_busy("not a code"));
    }
}
