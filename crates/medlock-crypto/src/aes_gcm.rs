//! AES-256-GCM encryption of record payloads.
//!
//! Blob format: [1 byte: version=1][12 bytes: nonce][N bytes: ciphertext + tag]
//! A fresh random nonce is generated per call and never reused for a key.
//! The AAD binds a ciphertext to its namespace and storage key, so a blob
//! copied under a different logical key fails authentication.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::CryptoError;
use crate::types::{
    KeyMaterial, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, CURRENT_VERSION, SUPPORTED_VERSIONS,
};

/// Logical location of a record, bound into the AEAD as associated data.
#[derive(Debug, Clone)]
pub struct EncryptionContext {
    pub namespace: String,
    pub storage_key: String,
}

/// Build AAD from the encryption context.
/// Format: [4 bytes: namespace length (u32 BE)][namespace UTF-8][storage key UTF-8]
fn build_aad(context: &EncryptionContext) -> Vec<u8> {
    let ns_bytes = context.namespace.as_bytes();
    let key_bytes = context.storage_key.as_bytes();
    let mut aad = Vec::with_capacity(4 + ns_bytes.len() + key_bytes.len());
    aad.extend_from_slice(&(ns_bytes.len() as u32).to_be_bytes());
    aad.extend_from_slice(ns_bytes);
    aad.extend_from_slice(key_bytes);
    aad
}

/// Generate a random 12-byte nonce for AES-GCM.
fn generate_nonce() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut nonce = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut nonce).map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(nonce)
}

/// Encrypt a payload under `key`, returning the versioned blob.
pub fn encrypt(
    plaintext: &[u8],
    key: &KeyMaterial,
    context: &EncryptionContext,
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let iv = generate_nonce()?;
    let nonce = Nonce::from_slice(&iv);

    let aad = build_aad(context);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(1 + iv.len() + ciphertext.len());
    blob.push(CURRENT_VERSION);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a versioned blob under `key`.
///
/// A GCM tag mismatch (tampered blob, wrong key, or wrong context) is a
/// hard `AuthenticationFailed` — never a silent fallback.
pub fn decrypt(
    blob: &[u8],
    key: &KeyMaterial,
    context: &EncryptionContext,
) -> Result<Vec<u8>, CryptoError> {
    let min_length = 1 + AES_GCM_IV_LENGTH + AES_GCM_TAG_LENGTH;
    if blob.len() < min_length {
        return Err(CryptoError::DataTooShort);
    }

    let version = blob[0];
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(CryptoError::UnsupportedVersion(version));
    }

    let iv = &blob[1..1 + AES_GCM_IV_LENGTH];
    let ciphertext = &blob[1 + AES_GCM_IV_LENGTH..];

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let nonce = Nonce::from_slice(iv);

    let aad = build_aad(context);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    fn ctx(storage_key: &str) -> EncryptionContext {
        EncryptionContext {
            namespace: "medlock.test".to_string(),
            storage_key: storage_key.to_string(),
        }
    }

    #[test]
    fn round_trip() {
        let key = generate_key().unwrap();
        let blob = encrypt(b"name=Jane", &key, &ctx("profile")).unwrap();
        let plaintext = decrypt(&blob, &key, &ctx("profile")).unwrap();
        assert_eq!(plaintext, b"name=Jane");
    }

    #[test]
    fn round_trip_empty_payload() {
        let key = generate_key().unwrap();
        let blob = encrypt(b"", &key, &ctx("empty")).unwrap();
        assert_eq!(decrypt(&blob, &key, &ctx("empty")).unwrap(), b"");
    }

    #[test]
    fn blob_layout() {
        let key = generate_key().unwrap();
        let payload = b"payload";
        let blob = encrypt(payload, &key, &ctx("k")).unwrap();
        assert_eq!(blob[0], CURRENT_VERSION);
        assert_eq!(
            blob.len(),
            1 + AES_GCM_IV_LENGTH + payload.len() + AES_GCM_TAG_LENGTH
        );
    }

    #[test]
    fn nonce_freshness_gives_distinct_ciphertexts() {
        let key = generate_key().unwrap();
        let a = encrypt(b"same", &key, &ctx("k")).unwrap();
        let b = encrypt(b"same", &key, &ctx("k")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = generate_key().unwrap();
        let mut blob = encrypt(b"payload", &key, &ctx("k")).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(
            decrypt(&blob, &key, &ctx("k")),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_nonce_fails_authentication() {
        let key = generate_key().unwrap();
        let mut blob = encrypt(b"payload", &key, &ctx("k")).unwrap();
        blob[1] ^= 0x01;
        assert!(matches!(
            decrypt(&blob, &key, &ctx("k")),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let key1 = generate_key().unwrap();
        let key2 = generate_key().unwrap();
        let blob = encrypt(b"payload", &key1, &ctx("k")).unwrap();
        assert!(matches!(
            decrypt(&blob, &key2, &ctx("k")),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_context_fails_authentication() {
        let key = generate_key().unwrap();
        let blob = encrypt(b"payload", &key, &ctx("profile")).unwrap();
        assert!(matches!(
            decrypt(&blob, &key, &ctx("documents")),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn rejects_short_blob() {
        let key = generate_key().unwrap();
        assert!(matches!(
            decrypt(&[1u8; 10], &key, &ctx("k")),
            Err(CryptoError::DataTooShort)
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let key = generate_key().unwrap();
        let mut blob = encrypt(b"payload", &key, &ctx("k")).unwrap();
        blob[0] = 9;
        assert!(matches!(
            decrypt(&blob, &key, &ctx("k")),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }
}
