//! # Portier API
//!
//! HTTP surface of the authentication core.
//!
//! ## Endpoints
//!
//! - `POST /portier.backend.v1.BackendService/<Method>` - backend RPCs, JSON
//!   in and out, behind the request authenticator
//! - `GET /v1/projects/{project_id}/session-public-keys` - JWK set of a
//!   project's active session signing keys
//! - `GET /health` - liveness

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod middleware;
pub mod rpc;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorBody};
pub use state::ApiState;

/// Prefix of every backend RPC path.
pub const BACKEND_SERVICE: &str = "/portier.backend.v1.BackendService";

/// Builds the full router.
pub fn router(state: ApiState) -> Router {
    let rpc = Router::new()
        .route(
            "/portier.backend.v1.BackendService/ConsoleGetConfiguration",
            post(rpc::console_get_configuration),
        )
        .route(
            "/portier.backend.v1.BackendService/AuthenticateApiKey",
            post(rpc::authenticate_api_key),
        )
        .route(
            "/portier.backend.v1.BackendService/GetProject",
            post(rpc::get_project),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        .merge(rpc)
        .route(
            "/v1/projects/{project_id}/session-public-keys",
            get(keys::session_public_keys),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
