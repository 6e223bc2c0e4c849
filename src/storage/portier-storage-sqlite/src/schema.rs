//! Schema migrations, applied in order on every open.

pub(crate) const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id                 TEXT PRIMARY KEY,
        organization_id    TEXT UNIQUE,
        is_console         INTEGER NOT NULL DEFAULT 0,
        display_name       TEXT NOT NULL,
        vault_domain       TEXT NOT NULL,
        cookie_domain      TEXT NOT NULL,
        logo_url           TEXT,
        dark_mode_logo_url TEXT,
        email_quota_daily  INTEGER,
        created_at         INTEGER NOT NULL
    )
    "#,
    // At most one console project can ever be committed.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_console ON projects (is_console) WHERE is_console = 1",
    r#"
    CREATE TABLE IF NOT EXISTS project_trusted_domains (
        project_id TEXT NOT NULL REFERENCES projects (id),
        domain     TEXT NOT NULL,
        PRIMARY KEY (project_id, domain)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id           TEXT PRIMARY KEY,
        project_id   TEXT NOT NULL REFERENCES projects (id),
        display_name TEXT NOT NULL,
        created_at   INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations (id),
        email           TEXT NOT NULL,
        password_hash   TEXT,
        is_owner        INTEGER NOT NULL,
        created_at      INTEGER NOT NULL,
        UNIQUE (organization_id, email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS session_signing_keys (
        id                     TEXT PRIMARY KEY,
        project_id             TEXT NOT NULL REFERENCES projects (id),
        public_key             BLOB NOT NULL,
        private_key_ciphertext BLOB NOT NULL,
        expires_at             INTEGER NOT NULL,
        created_at             INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_session_signing_keys_project ON session_signing_keys (project_id, expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS backend_api_keys (
        id                  TEXT PRIMARY KEY,
        project_id          TEXT NOT NULL REFERENCES projects (id),
        display_name        TEXT NOT NULL,
        secret_sha256       BLOB NOT NULL UNIQUE,
        authentication_only INTEGER NOT NULL,
        revoked             INTEGER NOT NULL DEFAULT 0,
        created_at          INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_email_daily_quota_usage (
        project_id  TEXT NOT NULL REFERENCES projects (id),
        day         INTEGER NOT NULL,
        quota_usage INTEGER NOT NULL,
        PRIMARY KEY (project_id, day)
    )
    "#,
];
