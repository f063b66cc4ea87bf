//! Symmetric key generation.

use crate::error::CryptoError;
use crate::types::{KeyMaterial, AES_KEY_LENGTH};

/// Generate a random 256-bit key from the OS CSPRNG.
pub fn generate_key() -> Result<KeyMaterial, CryptoError> {
    let mut bytes = [0u8; AES_KEY_LENGTH];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(KeyMaterial::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = generate_key().unwrap();
        let b = generate_key().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn generated_key_is_not_all_zero() {
        let key = generate_key().unwrap();
        assert!(key.as_bytes().iter().any(|&b| b != 0));
    }
}
