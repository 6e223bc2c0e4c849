//! Backend selection.

use std::fmt;
use std::str::FromStr;

use crate::error::KmsError;

/// Names of the supported backends, as used on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmsBackend {
    /// `aws_kms_v1`
    AwsKmsV1,
    /// `gcp_kms_v1`
    GcpKmsV1,
}

impl KmsBackend {
    /// Returns the configuration name of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsKmsV1 => "aws_kms_v1",
            Self::GcpKmsV1 => "gcp_kms_v1",
        }
    }
}

impl fmt::Display for KmsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KmsBackend {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws_kms_v1" => Ok(Self::AwsKmsV1),
            "gcp_kms_v1" => Ok(Self::GcpKmsV1),
            other => Err(KmsError::Configuration(format!(
                "unsupported kms backend: {other:?}"
            ))),
        }
    }
}

/// Complete configuration for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmsConfig {
    /// AWS KMS with an asymmetric encryption key.
    AwsKmsV1 {
        /// Key id, ARN, or alias.
        key_id: String,
        /// Endpoint override, e.g. a local KMS emulator.
        base_endpoint: Option<String>,
    },
    /// Google Cloud KMS with a symmetric key.
    GcpKmsV1 {
        /// Full resource name:
        /// `projects/*/locations/*/keyRings/*/cryptoKeys/*`.
        key_name: String,
        /// Endpoint override.
        base_endpoint: Option<String>,
    },
}

impl KmsConfig {
    /// Builds a configuration from flat command-line values.
    ///
    /// Only the values belonging to `backend` are read. Empty strings count as
    /// unset.
    pub fn from_flags(
        backend: &str,
        aws_kms_v1_key_id: Option<&str>,
        aws_kms_v1_base_endpoint: Option<&str>,
        gcp_kms_v1_key_name: Option<&str>,
        gcp_kms_v1_base_endpoint: Option<&str>,
    ) -> Result<Self, KmsError> {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);

        match backend.parse::<KmsBackend>()? {
            KmsBackend::AwsKmsV1 => Ok(Self::AwsKmsV1 {
                key_id: non_empty(aws_kms_v1_key_id).ok_or_else(|| {
                    KmsError::Configuration("aws_kms_v1 requires a key id".to_string())
                })?,
                base_endpoint: non_empty(aws_kms_v1_base_endpoint),
            }),
            KmsBackend::GcpKmsV1 => Ok(Self::GcpKmsV1 {
                key_name: non_empty(gcp_kms_v1_key_name).ok_or_else(|| {
                    KmsError::Configuration("gcp_kms_v1 requires a key name".to_string())
                })?,
                base_endpoint: non_empty(gcp_kms_v1_base_endpoint),
            }),
        }
    }

    /// Returns which backend this configuration selects.
    pub fn backend(&self) -> KmsBackend {
        match self {
            Self::AwsKmsV1 { .. } => KmsBackend::AwsKmsV1,
            Self::GcpKmsV1 { .. } => KmsBackend::GcpKmsV1,
        }
    }
}
