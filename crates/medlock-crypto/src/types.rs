//! Shared constants and the key material type.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES-256 key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM nonce length in bytes (96 bits, the standard recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// SHA-256 digest length in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Blob version written by `encrypt`.
pub const CURRENT_VERSION: u8 = 1;

/// Blob versions `decrypt` accepts.
pub const SUPPORTED_VERSIONS: [u8; 1] = [1];

/// 256-bit symmetric key material. Zeroed on drop.
///
/// Material never leaves this type except through `as_bytes` for the
/// duration of one cipher call.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; AES_KEY_LENGTH]);

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; AES_KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: AES_KEY_LENGTH,
                    got: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

// Key material must never leak through Debug output.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial([redacted])")
    }
}
