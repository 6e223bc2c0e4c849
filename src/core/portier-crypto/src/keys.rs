//! Key types with automatic memory zeroization.
//!
//! Session tokens are signed with ECDSA P-256 keys. The private half only
//! ever leaves this module as PKCS#8 DER wrapped in `Zeroizing`, and the
//! public half is exchanged as SubjectPublicKeyInfo DER.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::aead::KEY_SIZE;
use crate::error::CryptoError;
use crate::random::generate_key;

/// Size in bytes of a single P-256 affine coordinate.
pub const COORDINATE_SIZE: usize = 32;

/// A 256-bit symmetric encryption key with automatic zeroization.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generates a new random symmetric key.
    pub fn generate() -> Self {
        let key = generate_key();
        Self { bytes: *key }
    }

    /// Creates a symmetric key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {} bytes, got {}", KEY_SIZE, bytes.len()))
        })?;
        Ok(Self { bytes })
    }

    /// Returns the raw key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An ECDSA P-256 key pair used to sign session tokens.
#[derive(Clone)]
pub struct SigningKeyPair {
    secret: p256::SecretKey,
}

impl SigningKeyPair {
    /// Generates a fresh key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            secret: p256::SecretKey::random(&mut OsRng),
        }
    }

    /// Parses a PKCS#8 DER encoded private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let secret = p256::SecretKey::from_pkcs8_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("pkcs8: {e}")))?;
        Ok(Self { secret })
    }

    /// Encodes the private key as PKCS#8 DER (the embedded public key included).
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let document = self
            .secret
            .to_pkcs8_der()
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Returns the public half of this key pair.
    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey {
            inner: self.secret.public_key(),
        }
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &self.public_key())
            .finish()
    }
}

/// The public half of a session signing key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningPublicKey {
    inner: p256::PublicKey,
}

impl SigningPublicKey {
    /// Parses a SubjectPublicKeyInfo DER encoded public key.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = p256::PublicKey::from_public_key_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("spki: {e}")))?;
        Ok(Self { inner })
    }

    /// Encodes the key as SubjectPublicKeyInfo DER.
    pub fn to_spki_der(&self) -> Result<Vec<u8>, CryptoError> {
        let document = self
            .inner
            .to_public_key_der()
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Returns the big-endian affine `(x, y)` coordinates.
    pub fn coordinates(&self) -> Result<([u8; COORDINATE_SIZE], [u8; COORDINATE_SIZE]), CryptoError> {
        let point = self.inner.to_encoded_point(false);
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(CryptoError::InvalidKey(
                    "public key is the identity point".to_string(),
                ))
            }
        };

        let mut out_x = [0u8; COORDINATE_SIZE];
        let mut out_y = [0u8; COORDINATE_SIZE];
        out_x.copy_from_slice(x);
        out_y.copy_from_slice(y);
        Ok((out_x, out_y))
    }
}
