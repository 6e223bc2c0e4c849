//! The per-call authentication gate.
//!
//! Each call takes exactly one path:
//! - procedures in [`SKIP_PROCEDURES`] run with no identity
//! - a non-empty `Authorization` header selects the backend API key path
//! - anything else selects the console session cookie path
//!
//! There is no fallback from one credential path to the other.

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::HeaderMap;
use portier_ids::PROJECT;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::cookie::last_cookie_value;
use crate::{AuthBackend, AuthError, CallContext, IdentityContext};

/// Procedures served without authentication.
pub const SKIP_PROCEDURES: &[&str] = &["/portier.backend.v1.BackendService/ConsoleGetConfiguration"];

/// The only procedures an authentication-only API key may call.
pub const AUTHENTICATION_PROCEDURES: &[&str] =
    &["/portier.backend.v1.BackendService/AuthenticateApiKey"];

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticates inbound calls.
#[derive(Clone)]
pub struct RequestAuthenticator {
    api_keys: Arc<dyn AuthBackend>,
    sessions: Arc<dyn AuthBackend>,
    cookie_name: String,
}

impl RequestAuthenticator {
    /// Creates an authenticator whose session cookie is keyed by
    /// `console_project_id`.
    pub fn new(
        api_keys: Arc<dyn AuthBackend>,
        sessions: Arc<dyn AuthBackend>,
        console_project_id: Uuid,
    ) -> Self {
        Self {
            api_keys,
            sessions,
            cookie_name: Self::cookie_name(console_project_id),
        }
    }

    /// Name of the console session cookie:
    /// `portier_<formatted console project id>_access_token`.
    pub fn cookie_name(console_project_id: Uuid) -> String {
        format!("portier_{}_access_token", PROJECT.format(console_project_id))
    }

    /// Authenticates a call to `procedure` carrying `headers`.
    pub async fn authenticate(
        &self,
        procedure: &str,
        headers: &HeaderMap,
    ) -> Result<CallContext, AuthError> {
        if SKIP_PROCEDURES.contains(&procedure) {
            return Ok(CallContext::unauthenticated(procedure));
        }

        let span = info_span!("authn", procedure);
        async {
            let identity = match headers.get(AUTHORIZATION).filter(|v| !v.is_empty()) {
                Some(authorization) => {
                    let authorization = authorization.to_str().map_err(|_| {
                        debug!("Authorization header is not visible ASCII");
                        AuthError::Unauthenticated
                    })?;
                    self.authenticate_bearer(procedure, authorization).await?
                }
                None => self.authenticate_cookie(headers).await?,
            };

            debug!(
                caller = %identity.caller(),
                project_id = %PROJECT.format(identity.project_id()),
                "Authenticated call"
            );
            Ok::<_, AuthError>(CallContext::authenticated(procedure, identity))
        }
        .instrument(span)
        .await
    }

    async fn authenticate_bearer(
        &self,
        procedure: &str,
        authorization: &str,
    ) -> Result<IdentityContext, AuthError> {
        let Some(secret) = authorization.strip_prefix(BEARER_PREFIX) else {
            debug!("Authorization header is not a bearer credential");
            return Err(AuthError::Unauthenticated);
        };

        let identity = self.api_keys.validate(secret).await.map_err(|e| {
            debug!(backend = self.api_keys.name(), error = %e, "Credential rejected");
            e
        })?;

        if let IdentityContext::BackendApiKey(key) = &identity {
            if key.authentication_only && !AUTHENTICATION_PROCEDURES.contains(&procedure) {
                debug!(caller = %identity.caller(), "Authentication-only key used outside allow-list");
                return Err(AuthError::PermissionDenied);
            }
        }

        Ok(identity)
    }

    async fn authenticate_cookie(&self, headers: &HeaderMap) -> Result<IdentityContext, AuthError> {
        let token = match last_cookie_value(headers, &self.cookie_name) {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!(cookie = %self.cookie_name, "No session cookie");
                return Err(AuthError::Unauthenticated);
            }
        };

        self.sessions.validate(&token).await.map_err(|e| {
            debug!(backend = self.sessions.name(), error = %e, "Credential rejected");
            e
        })
    }
}
