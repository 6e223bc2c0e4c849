//! Console session backend.

use async_trait::async_trait;
use portier_session::SessionTokens;
use uuid::Uuid;

use crate::{AuthBackend, AuthError, ConsoleSessionContext, IdentityContext};

/// Verifies console session tokens.
///
/// Tokens are always checked against the console project's keys and
/// audience. The resulting identity carries the project backing the
/// session's organization, which is the project the user manages.
#[derive(Clone)]
pub struct ConsoleSessionBackend {
    tokens: SessionTokens,
    console_project_id: Uuid,
}

impl ConsoleSessionBackend {
    /// Creates the backend.
    pub fn new(tokens: SessionTokens, console_project_id: Uuid) -> Self {
        Self {
            tokens,
            console_project_id,
        }
    }
}

#[async_trait]
impl AuthBackend for ConsoleSessionBackend {
    async fn validate(&self, credential: &str) -> Result<IdentityContext, AuthError> {
        let identity = self
            .tokens
            .verify(self.console_project_id, credential)
            .await?;

        Ok(IdentityContext::ConsoleSession(ConsoleSessionContext {
            user_id: identity.user_id,
            session_id: identity.session_id,
            organization_id: identity.organization_id,
            project_id: identity.project_id,
        }))
    }

    fn name(&self) -> &'static str {
        "console-session"
    }
}
