//! Per-call identity.
//!
//! The authenticator builds a [`CallContext`] once per call and hands it to
//! the handler. Nothing downstream reads identity from anywhere else.

use portier_ids::{BACKEND_API_KEY, PROJECT, SESSION, USER};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a caller holding a backend API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendApiKeyContext {
    /// Key id.
    pub backend_api_key_id: Uuid,
    /// Project the key belongs to.
    pub project_id: Uuid,
    /// Whether the key is limited to authentication procedures.
    pub authentication_only: bool,
}

/// Identity of a caller holding a console session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSessionContext {
    /// User.
    pub user_id: Uuid,
    /// Session.
    pub session_id: Uuid,
    /// Organization of the user.
    pub organization_id: Uuid,
    /// The project the user is managing. Almost never the console project.
    pub project_id: Uuid,
}

/// Exactly one authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityContext {
    /// Machine caller.
    BackendApiKey(BackendApiKeyContext),
    /// Human caller.
    ConsoleSession(ConsoleSessionContext),
}

impl IdentityContext {
    /// The project the caller acts on.
    pub fn project_id(&self) -> Uuid {
        match self {
            Self::BackendApiKey(ctx) => ctx.project_id,
            Self::ConsoleSession(ctx) => ctx.project_id,
        }
    }

    /// Formatted id of the caller, for logs and audit.
    pub fn caller(&self) -> String {
        match self {
            Self::BackendApiKey(ctx) => BACKEND_API_KEY.format(ctx.backend_api_key_id),
            Self::ConsoleSession(ctx) => USER.format(ctx.user_id),
        }
    }

    /// Formatted session id, if the caller is a console session.
    pub fn session(&self) -> Option<String> {
        match self {
            Self::BackendApiKey(_) => None,
            Self::ConsoleSession(ctx) => Some(SESSION.format(ctx.session_id)),
        }
    }
}

/// What a handler learns about the call it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Fully qualified procedure, e.g. `/portier.backend.v1.BackendService/GetProject`.
    pub procedure: String,
    /// `None` only for procedures that skip authentication.
    pub identity: Option<IdentityContext>,
}

impl CallContext {
    /// Context of a call that skipped authentication.
    pub fn unauthenticated(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            identity: None,
        }
    }

    /// Context of an authenticated call.
    pub fn authenticated(procedure: impl Into<String>, identity: IdentityContext) -> Self {
        Self {
            procedure: procedure.into(),
            identity: Some(identity),
        }
    }

    /// The caller's identity.
    ///
    /// # Panics
    ///
    /// Panics when called while serving a procedure that skips
    /// authentication. That is a wiring bug, not a request error.
    pub fn identity(&self) -> &IdentityContext {
        match &self.identity {
            Some(identity) => identity,
            None => panic!("call context for {} carries no identity", self.procedure),
        }
    }

    /// The project the caller acts on.
    ///
    /// # Panics
    ///
    /// Same as [`identity`](Self::identity).
    pub fn project_id(&self) -> Uuid {
        self.identity().project_id()
    }

    /// Formatted [`project_id`](Self::project_id).
    pub fn formatted_project_id(&self) -> String {
        PROJECT.format(self.project_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> IdentityContext {
        IdentityContext::ConsoleSession(ConsoleSessionContext {
            user_id: Uuid::from_u128(1),
            session_id: Uuid::from_u128(2),
            organization_id: Uuid::from_u128(3),
            project_id: Uuid::from_u128(4),
        })
    }

    #[test]
    fn test_project_id_per_variant() {
        let api_key = IdentityContext::BackendApiKey(BackendApiKeyContext {
            backend_api_key_id: Uuid::from_u128(9),
            project_id: Uuid::from_u128(8),
            authentication_only: false,
        });
        assert_eq!(api_key.project_id(), Uuid::from_u128(8));
        assert!(api_key.caller().starts_with("backend_api_key_"));
        assert_eq!(api_key.session(), None);

        assert_eq!(session().project_id(), Uuid::from_u128(4));
        assert!(session().caller().starts_with("user_"));
        assert!(session().session().unwrap().starts_with("session_"));
    }

    #[test]
    fn test_call_context_accessors() {
        let ctx = CallContext::authenticated("/svc/Method", session());
        assert_eq!(ctx.project_id(), Uuid::from_u128(4));
        assert!(ctx.formatted_project_id().starts_with("project_"));
    }

    #[test]
    #[should_panic(expected = "carries no identity")]
    fn test_missing_identity_panics() {
        CallContext::unauthenticated("/svc/Public").project_id();
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(session()).unwrap();
        assert_eq!(json["kind"], "console_session");
    }
}
