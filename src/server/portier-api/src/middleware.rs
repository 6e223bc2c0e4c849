//! Authentication middleware.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::{ApiError, ApiState};

/// Authenticates the call and hands the resulting
/// [`CallContext`](portier_auth::CallContext) to the handler through request
/// extensions. Rejected calls never reach the handler.
pub async fn authenticate(State(state): State<ApiState>, mut request: Request, next: Next) -> Response {
    let procedure = request.uri().path().to_string();

    match state
        .authenticator
        .authenticate(&procedure, request.headers())
        .await
    {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
