//! Session token issuance and verification.
//!
//! Tokens are compact ES256 JWTs. The header `kid` names the signing key and
//! the audience is derived from the signing project's id, so a token only
//! ever verifies against the project that issued it.
//!
//! Verification checks, in order:
//! 1. the header parses and names an ES256 key
//! 2. the `kid` is one of the project's active keys
//! 3. the signature and the audience
//! 4. `exp` and `nbf` against the clock
//! 5. the nested claim ids
//!
//! Every failure above is reported as [`SessionError::AuthenticationFailed`]
//! and the reason is only logged. The last step resolves which project the
//! session's organization backs; a failure there is an integrity error.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use portier_crypto::CryptoError;
use portier_ids::{IdFormat, ORGANIZATION, PROJECT, SESSION, SESSION_SIGNING_KEY, USER};
use portier_storage::StorageError;
use tracing::{debug, error};
use uuid::Uuid;

use crate::claims::{OrganizationClaim, SessionClaim, SessionClaims, UserClaim};
use crate::error::SessionError;
use crate::signing_keys::SigningKeyManager;
use crate::unix_now;

/// Token policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    /// Domain under which project audiences live.
    pub audience_root_domain: String,
    /// Lifetime of issued access tokens.
    pub access_token_ttl: Duration,
    /// Clock skew tolerated on `exp` and `nbf`.
    pub leeway: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            audience_root_domain: "portier.app".to_string(),
            access_token_ttl: Duration::from_secs(300),
            leeway: Duration::ZERO,
        }
    }
}

impl TokenConfig {
    /// Audience of tokens signed by `project_id`:
    /// `https://project-<suffix>.<audience_root_domain>`.
    pub fn audience(&self, project_id: Uuid) -> String {
        format!(
            "https://{}.{}",
            PROJECT.format(project_id).replace('_', "-"),
            self.audience_root_domain
        )
    }
}

/// Who a token is issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSubject {
    /// Signing project.
    pub project_id: Uuid,
    /// Organization of the user.
    pub organization_id: Uuid,
    /// User.
    pub user_id: Uuid,
    /// Session.
    pub session_id: Uuid,
    /// Optional email claim.
    pub user_email: Option<String>,
    /// Optional organization name claim.
    pub organization_display_name: Option<String>,
}

/// A freshly signed token.
#[derive(Clone)]
pub struct IssuedToken {
    /// Compact JWT, suitable as a cookie value.
    pub access_token: String,
    /// Expiry, Unix seconds.
    pub expires_at: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity established by a verified session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    /// User.
    pub user_id: Uuid,
    /// Session.
    pub session_id: Uuid,
    /// Organization of the user.
    pub organization_id: Uuid,
    /// The project the organization backs. This is the project the caller
    /// acts on, which differs from the signing project when a console
    /// session manages another tenant.
    pub project_id: Uuid,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionTokens {
    keys: SigningKeyManager,
    config: TokenConfig,
}

impl SessionTokens {
    /// Creates the token service.
    pub fn new(keys: SigningKeyManager, config: TokenConfig) -> Self {
        Self { keys, config }
    }

    /// Returns the token policy.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Signs a token for `subject` with its project's current key.
    pub async fn issue(&self, subject: &SessionSubject) -> Result<IssuedToken, SessionError> {
        self.issue_at(subject, unix_now()).await
    }

    /// [`issue`](Self::issue) with an explicit clock.
    pub async fn issue_at(
        &self,
        subject: &SessionSubject,
        now: i64,
    ) -> Result<IssuedToken, SessionError> {
        let ttl = seconds(self.config.access_token_ttl)?;
        let audience = self.config.audience(subject.project_id);
        let user_id = USER.format(subject.user_id);

        let claims = SessionClaims {
            iss: audience.clone(),
            sub: user_id.clone(),
            aud: audience,
            exp: now + ttl,
            nbf: now,
            iat: now,
            session: SessionClaim {
                id: SESSION.format(subject.session_id),
            },
            user: UserClaim {
                id: user_id,
                email: subject.user_email.clone(),
            },
            organization: OrganizationClaim {
                id: ORGANIZATION.format(subject.organization_id),
                display_name: subject.organization_display_name.clone(),
            },
        };

        let (key_id, pair) = self.keys.signing_key_at(subject.project_id, now).await?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(SESSION_SIGNING_KEY.format(key_id));

        let access_token = {
            let der = pair.to_pkcs8_der()?;
            jsonwebtoken::encode(&header, &claims, &EncodingKey::from_ec_der(&der))
                .map_err(|e| CryptoError::EncodingFailed(format!("sign session token: {e}")))?
        };

        debug!(
            project_id = %PROJECT.format(subject.project_id),
            session_id = %claims.session.id,
            kid = header.kid.as_deref().unwrap_or_default(),
            expires_at = claims.exp,
            "Issued session token"
        );

        Ok(IssuedToken {
            access_token,
            expires_at: claims.exp,
        })
    }

    /// Verifies `token` as issued by `project_id`.
    pub async fn verify(&self, project_id: Uuid, token: &str) -> Result<SessionIdentity, SessionError> {
        self.verify_at(project_id, token, unix_now()).await
    }

    /// [`verify`](Self::verify) with an explicit clock.
    pub async fn verify_at(
        &self,
        project_id: Uuid,
        token: &str,
        now: i64,
    ) -> Result<SessionIdentity, SessionError> {
        let reject = |reason: String| {
            debug!(project_id = %PROJECT.format(project_id), reason = %reason, "Rejected session token");
            SessionError::AuthenticationFailed
        };

        let header =
            jsonwebtoken::decode_header(token).map_err(|e| reject(format!("header: {e}")))?;
        if header.alg != Algorithm::ES256 {
            return Err(reject(format!("algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| reject("no kid".to_string()))?;
        let key_id = SESSION_SIGNING_KEY
            .parse(&kid)
            .map_err(|_| reject(format!("malformed kid {kid:?}")))?;

        let key = self
            .keys
            .active_public_keys_at(project_id, now)
            .await?
            .into_iter()
            .find(|key| key.id == key_id)
            .ok_or_else(|| reject(format!("kid {kid} is not an active key")))?;

        let (x, y) = key.public_key.coordinates()?;
        let decoding_key =
            DecodingKey::from_ec_components(&URL_SAFE_NO_PAD.encode(x), &URL_SAFE_NO_PAD.encode(y))
                .map_err(|e| CryptoError::InvalidKey(format!("decoding key: {e}")))?;

        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&[self.config.audience(project_id)]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<SessionClaims>(token, &decoding_key, &validation)
            .map_err(|e| reject(format!("signature or claims: {e}")))?
            .claims;

        let leeway = seconds(self.config.leeway)?;
        if claims.exp <= now - leeway {
            return Err(reject(format!("expired at {}", claims.exp)));
        }
        if claims.nbf > now + leeway {
            return Err(reject(format!("not valid before {}", claims.nbf)));
        }

        let parse = |format: IdFormat, value: &str| {
            format
                .parse(value)
                .map_err(|_| reject(format!("malformed {} claim", format.prefix())))
        };
        let user_id = parse(USER, &claims.user.id)?;
        let session_id = parse(SESSION, &claims.session.id)?;
        let organization_id = parse(ORGANIZATION, &claims.organization.id)?;

        let backed_project_id = match self
            .keys
            .store()
            .get_project_id_organization_backs(organization_id)
            .await
        {
            Ok(id) => id,
            Err(StorageError::NotFound(_)) => {
                error!(
                    organization_id = %claims.organization.id,
                    "Session organization backs no project"
                );
                return Err(SessionError::Integrity(format!(
                    "organization {} backs no project",
                    claims.organization.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SessionIdentity {
            user_id,
            session_id,
            organization_id,
            project_id: backed_project_id,
        })
    }
}

fn seconds(duration: Duration) -> Result<i64, SessionError> {
    i64::try_from(duration.as_secs())
        .map_err(|_| SessionError::InvalidInput(format!("duration {duration:?} too large")))
}
