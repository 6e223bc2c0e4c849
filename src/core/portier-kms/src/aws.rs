//! AWS KMS backend (`aws_kms_v1`).
//!
//! Uses an asymmetric KMS key with `RSAES_OAEP_SHA_256`. Region and
//! credentials come from the standard AWS environment chain.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::EncryptionAlgorithmSpec;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::KmsError;
use crate::KeyProtector;

const BACKEND: &str = "aws_kms_v1";

/// AWS KMS client bound to one key.
pub struct AwsKmsV1 {
    client: aws_sdk_kms::Client,
    key_id: String,
}

impl AwsKmsV1 {
    /// Loads the ambient AWS configuration and builds a client for `key_id`.
    pub async fn new(key_id: String, base_endpoint: Option<String>) -> Result<Self, KmsError> {
        let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;
        if sdk.region().is_none() {
            return Err(KmsError::Configuration(
                "aws_kms_v1: no AWS region configured".to_string(),
            ));
        }
        let credentials = sdk.credentials_provider().ok_or_else(|| {
            KmsError::Configuration("aws_kms_v1: no AWS credentials provider found".to_string())
        })?;
        // The default chain is always present; only resolving it shows
        // whether credentials exist.
        credentials.provide_credentials().await.map_err(|e| {
            KmsError::Configuration(format!(
                "aws_kms_v1: no AWS credentials found: {}",
                DisplayErrorContext(&e)
            ))
        })?;

        let mut builder = aws_sdk_kms::config::Builder::from(&sdk);
        if let Some(endpoint) = &base_endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            key_id = %key_id,
            endpoint = base_endpoint.as_deref().unwrap_or("default"),
            "Built AWS KMS client"
        );

        Ok(Self {
            client: aws_sdk_kms::Client::from_conf(builder.build()),
            key_id,
        })
    }

    fn backend_error(operation: &'static str, message: String) -> KmsError {
        KmsError::Backend {
            backend: BACKEND,
            operation,
            message,
        }
    }
}

impl std::fmt::Debug for AwsKmsV1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsKmsV1")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyProtector for AwsKmsV1 {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let output = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .encryption_algorithm(EncryptionAlgorithmSpec::RsaesOaepSha256)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| Self::backend_error("encrypt", DisplayErrorContext(&e).to_string()))?;

        let ciphertext = output.ciphertext_blob().ok_or_else(|| {
            KmsError::MalformedResponse("encrypt response has no ciphertext".to_string())
        })?;

        Ok(ciphertext.as_ref().to_vec())
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, KmsError> {
        let output = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .encryption_algorithm(EncryptionAlgorithmSpec::RsaesOaepSha256)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(|e| Self::backend_error("decrypt", DisplayErrorContext(&e).to_string()))?;

        let plaintext = output.plaintext().ok_or_else(|| {
            KmsError::MalformedResponse("decrypt response has no plaintext".to_string())
        })?;

        Ok(Zeroizing::new(plaintext.as_ref().to_vec()))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    const CREDENTIAL_VARS: &[&str] = &[
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_PROFILE",
        "AWS_ROLE_ARN",
        "AWS_WEB_IDENTITY_TOKEN_FILE",
        "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
        "AWS_CONTAINER_CREDENTIALS_FULL_URI",
    ];

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        // Rewrites the process environment; the live round trip below needs it intact.
        if std::env::var("PORTIER_KMS_TEST_AWS_V1_KEY_ID").is_ok() {
            return;
        }
        for var in CREDENTIAL_VARS {
            std::env::remove_var(var);
        }
        std::env::set_var("AWS_REGION", "us-east-1");
        std::env::set_var("AWS_EC2_METADATA_DISABLED", "true");
        std::env::set_var("AWS_CONFIG_FILE", "/nonexistent/portier/aws/config");
        std::env::set_var("AWS_SHARED_CREDENTIALS_FILE", "/nonexistent/portier/aws/credentials");

        let result = AwsKmsV1::new("alias/portier".to_string(), None).await;
        assert!(
            matches!(result, Err(KmsError::Configuration(_))),
            "built a client without credentials: {result:?}"
        );
    }

    // Runs only when a real key is provided, e.g.
    // PORTIER_KMS_TEST_AWS_V1_KEY_ID=arn:aws:kms:...
    #[tokio::test]
    async fn test_aws_kms_v1_round_trip() {
        let Ok(key_id) = std::env::var("PORTIER_KMS_TEST_AWS_V1_KEY_ID") else {
            return;
        };
        let endpoint = std::env::var("PORTIER_KMS_TEST_AWS_V1_BASE_ENDPOINT").ok();

        let kms = AwsKmsV1::new(key_id, endpoint).await.unwrap();
        let key = portier_crypto::SigningKeyPair::generate().to_pkcs8_der().unwrap();

        let ciphertext = kms.encrypt(&key).await.unwrap();
        assert_ne!(ciphertext, *key);
        assert_eq!(*kms.decrypt(&ciphertext).await.unwrap(), *key);
    }
}
