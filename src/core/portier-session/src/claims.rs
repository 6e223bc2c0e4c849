//! Session token claim set.

use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
///
/// All ids are formatted external ids. `iss` and `aud` are both the signing
/// project's audience; `sub` repeats `user.id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issuer.
    pub iss: String,
    /// Subject, the user id.
    pub sub: String,
    /// Audience derived from the signing project.
    pub aud: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Not before, Unix seconds.
    pub nbf: i64,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// The session.
    pub session: SessionClaim,
    /// The user.
    pub user: UserClaim,
    /// The user's organization.
    pub organization: OrganizationClaim,
}

/// `session` sub-claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaim {
    /// Session id.
    pub id: String,
}

/// `user` sub-claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    /// User id.
    pub id: String,
    /// Login email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `organization` sub-claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationClaim {
    /// Organization id.
    pub id: String,
    /// Organization name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
