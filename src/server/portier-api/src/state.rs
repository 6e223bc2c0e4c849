//! Shared handler state.

use std::sync::Arc;

use portier_auth::RequestAuthenticator;
use portier_session::SigningKeyManager;
use portier_storage::IdentityStore;
use uuid::Uuid;

/// Read-mostly handles shared by every call.
#[derive(Clone)]
pub struct ApiState {
    /// Per-call gate.
    pub authenticator: RequestAuthenticator,
    /// Source of published session public keys.
    pub keys: SigningKeyManager,
    /// Project reads.
    pub store: Arc<dyn IdentityStore>,
    /// The operating console project.
    pub console_project_id: Uuid,
}
