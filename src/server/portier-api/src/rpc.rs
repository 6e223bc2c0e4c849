//! Backend RPC handlers.
//!
//! Each handler receives the [`CallContext`] built by the authentication
//! middleware; none of them looks at credentials itself.

use axum::extract::State;
use axum::{Extension, Json};
use portier_auth::{CallContext, IdentityContext};
use portier_ids::{BACKEND_API_KEY, ORGANIZATION, PROJECT, USER};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiState};

/// Response of `ConsoleGetConfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfiguration {
    /// Formatted console project id.
    pub console_project_id: String,
}

/// Response of `AuthenticateApiKey`: who the caller is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Formatted project the caller acts on.
    pub project_id: String,
    /// Set for backend API key callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_api_key_id: Option<String>,
    /// Set for console session callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Set for console session callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Set for console session callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

/// A project as returned to its own callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    /// Formatted project id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Vault domain.
    pub vault_domain: String,
    /// Cookie domain.
    pub cookie_domain: String,
    /// Light-mode logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Dark-mode logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode_logo_url: Option<String>,
    /// Domains trusted for redirects.
    pub trusted_domains: Vec<String>,
    /// Creation time, Unix seconds.
    pub created_at: i64,
}

/// Response of `GetProject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetProjectResponse {
    /// The caller's project.
    pub project: ProjectView,
}

/// `ConsoleGetConfiguration`: public, no identity.
pub async fn console_get_configuration(State(state): State<ApiState>) -> Json<ConsoleConfiguration> {
    Json(ConsoleConfiguration {
        console_project_id: PROJECT.format(state.console_project_id),
    })
}

/// `AuthenticateApiKey`: echoes the authenticated identity.
pub async fn authenticate_api_key(Extension(ctx): Extension<CallContext>) -> Json<CallerIdentity> {
    let identity = ctx.identity();
    let mut caller = CallerIdentity {
        project_id: ctx.formatted_project_id(),
        backend_api_key_id: None,
        user_id: None,
        session_id: identity.session(),
        organization_id: None,
    };
    match identity {
        IdentityContext::BackendApiKey(key) => {
            caller.backend_api_key_id = Some(BACKEND_API_KEY.format(key.backend_api_key_id));
        }
        IdentityContext::ConsoleSession(session) => {
            caller.user_id = Some(USER.format(session.user_id));
            caller.organization_id = Some(ORGANIZATION.format(session.organization_id));
        }
    }
    Json(caller)
}

/// `GetProject`: the caller's authorization project.
pub async fn get_project(
    State(state): State<ApiState>,
    Extension(ctx): Extension<CallContext>,
) -> Result<Json<GetProjectResponse>, ApiError> {
    let project = state.store.get_project(ctx.project_id()).await?;

    Ok(Json(GetProjectResponse {
        project: ProjectView {
            id: PROJECT.format(project.id),
            display_name: project.display_name,
            vault_domain: project.vault_domain,
            cookie_domain: project.cookie_domain,
            logo_url: project.logo_url,
            dark_mode_logo_url: project.dark_mode_logo_url,
            trusted_domains: project.trusted_domains,
            created_at: project.created_at,
        },
    }))
}
