//! Public session key publication.

use axum::extract::{Path, State};
use axum::Json;
use portier_ids::PROJECT;
use portier_session::Jwk;
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiState};

/// A JWK set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Active keys, latest expiry first.
    pub keys: Vec<Jwk>,
}

/// `GET /v1/projects/{project_id}/session-public-keys`
pub async fn session_public_keys(
    State(state): State<ApiState>,
    Path(project_id): Path<String>,
) -> Result<Json<JwkSet>, ApiError> {
    let project_id = PROJECT.parse(&project_id)?;

    // 404 for unknown projects rather than an empty set.
    state.store.get_project(project_id).await?;

    let keys = state
        .keys
        .active_public_keys(project_id)
        .await?
        .iter()
        .map(|key| key.to_jwk())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(JwkSet { keys }))
}
