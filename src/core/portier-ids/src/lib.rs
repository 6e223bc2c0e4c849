//! # Portier IDs
//!
//! Every resource is stored under a UUID and shown to the outside world as
//! `<prefix>_<suffix>`, where the suffix is the UUID's 128-bit value in
//! lowercase base 36, left-padded to 25 digits.
//!
//! ```
//! use portier_ids::{PROJECT, SESSION_SIGNING_KEY};
//! use uuid::Uuid;
//!
//! let id = Uuid::new_v4();
//! let external = PROJECT.format(id);
//! assert!(external.starts_with("project_"));
//! assert_eq!(PROJECT.parse(&external).unwrap(), id);
//! assert!(SESSION_SIGNING_KEY.parse(&external).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;
use uuid::Uuid;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of base-36 digits needed for any `u128`.
pub const SUFFIX_LEN: usize = 25;

/// Errors returned when parsing an external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdFormatError {
    /// The value does not match the expected `<prefix>_<suffix>` form.
    #[error("invalid {expected} id")]
    Invalid {
        /// The resource prefix the caller expected.
        expected: &'static str,
    },
}

/// A resource prefix and the codec between UUIDs and external ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFormat {
    prefix: &'static str,
}

/// Projects.
pub const PROJECT: IdFormat = IdFormat::new("project");
/// Organizations.
pub const ORGANIZATION: IdFormat = IdFormat::new("organization");
/// Users.
pub const USER: IdFormat = IdFormat::new("user");
/// Sessions.
pub const SESSION: IdFormat = IdFormat::new("session");
/// Session signing keys; doubles as the token `kid`.
pub const SESSION_SIGNING_KEY: IdFormat = IdFormat::new("session_signing_key");
/// Backend API key records.
pub const BACKEND_API_KEY: IdFormat = IdFormat::new("backend_api_key");
/// Bearer secrets handed out for backend API keys.
pub const BACKEND_API_KEY_SECRET_TOKEN: IdFormat = IdFormat::new("portier_secret_key");

impl IdFormat {
    /// Creates a format for `prefix`.
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// Returns the prefix without the trailing underscore.
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Renders `id` as an external identifier.
    pub fn format(&self, id: Uuid) -> String {
        let mut value = id.as_u128();
        let mut digits = [b'0'; SUFFIX_LEN];
        for slot in digits.iter_mut().rev() {
            *slot = ALPHABET[(value % 36) as usize];
            value /= 36;
        }

        let mut out = String::with_capacity(self.prefix.len() + 1 + SUFFIX_LEN);
        out.push_str(self.prefix);
        out.push('_');
        // digits only holds ASCII from ALPHABET
        out.extend(digits.iter().map(|&b| b as char));
        out
    }

    /// Parses an external identifier back into its UUID.
    pub fn parse(&self, value: &str) -> Result<Uuid, IdFormatError> {
        let invalid = IdFormatError::Invalid {
            expected: self.prefix,
        };

        let suffix = value
            .strip_prefix(self.prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .ok_or_else(|| invalid.clone())?;
        if suffix.len() != SUFFIX_LEN {
            return Err(invalid);
        }

        let mut acc: u128 = 0;
        for b in suffix.bytes() {
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'z' => b - b'a' + 10,
                _ => return Err(invalid),
            };
            acc = acc
                .checked_mul(36)
                .and_then(|v| v.checked_add(u128::from(digit)))
                .ok_or_else(|| invalid.clone())?;
        }

        Ok(Uuid::from_u128(acc))
    }
}
