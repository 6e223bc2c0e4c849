//! Google Cloud KMS backend (`gcp_kms_v1`).
//!
//! Talks to the Cloud KMS REST API with a symmetric key. Access tokens come
//! from the ambient Google credentials (`GOOGLE_APPLICATION_CREDENTIALS`,
//! gcloud, or the metadata server).

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gcp_auth::TokenProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::KmsError;
use crate::KeyProtector;

const BACKEND: &str = "gcp_kms_v1";
const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: &'a str,
}

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    ciphertext: Option<String>,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
}

#[derive(Debug, Deserialize)]
struct DecryptResponse {
    plaintext: Option<String>,
}

/// Google Cloud KMS client bound to one key.
pub struct GcpKmsV1 {
    http: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    key_name: String,
    endpoint: String,
}

impl GcpKmsV1 {
    /// Finds ambient Google credentials and builds a client for `key_name`.
    pub async fn new(key_name: String, base_endpoint: Option<String>) -> Result<Self, KmsError> {
        let auth = gcp_auth::provider()
            .await
            .map_err(|e| KmsError::Configuration(format!("gcp_kms_v1: {e}")))?;

        let endpoint = base_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        debug!(key_name = %key_name, endpoint = %endpoint, "Built Cloud KMS client");

        Ok(Self {
            http: reqwest::Client::new(),
            auth,
            key_name,
            endpoint,
        })
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/v1/{}:{}", self.endpoint, self.key_name, operation)
    }

    async fn call<Req, Resp>(&self, operation: &'static str, body: &Req) -> Result<Resp, KmsError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let backend_error = |message: String| KmsError::Backend {
            backend: BACKEND,
            operation,
            message,
        };

        let token = self
            .auth
            .token(SCOPES)
            .await
            .map_err(|e| backend_error(format!("token: {e}")))?;

        let response = self
            .http
            .post(self.url(operation))
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| backend_error(e.to_string()))?;

        read_response(operation, response).await
    }
}

/// Decodes a successful response, or turns a failed one into
/// [`KmsError::Backend`] carrying the service's error body.
async fn read_response<Resp>(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<Resp, KmsError>
where
    Resp: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        return Err(KmsError::Backend {
            backend: BACKEND,
            operation,
            message: format!("HTTP {status}: {}", detail.trim()),
        });
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| KmsError::MalformedResponse(e.to_string()))
}

impl std::fmt::Debug for GcpKmsV1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpKmsV1")
            .field("key_name", &self.key_name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyProtector for GcpKmsV1 {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let encoded = Zeroizing::new(STANDARD.encode(plaintext));
        let response: EncryptResponse = self
            .call("encrypt", &EncryptRequest { plaintext: &encoded })
            .await?;

        let ciphertext = response.ciphertext.ok_or_else(|| {
            KmsError::MalformedResponse("encrypt response has no ciphertext".to_string())
        })?;
        STANDARD
            .decode(ciphertext)
            .map_err(|e| KmsError::MalformedResponse(format!("ciphertext: {e}")))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        let encoded = STANDARD.encode(ciphertext);
        let response: DecryptResponse = self
            .call("decrypt", &DecryptRequest { ciphertext: &encoded })
            .await?;

        let plaintext = Zeroizing::new(response.plaintext.ok_or_else(|| {
            KmsError::MalformedResponse("decrypt response has no plaintext".to_string())
        })?);
        STANDARD
            .decode(plaintext.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| KmsError::MalformedResponse(format!("plaintext: {e}")))
    }
}
