//! Plaintext integrity digests.
//!
//! The AEAD tag already authenticates ciphertext; this digest of the
//! plaintext is an independent check that survives the persistence layer,
//! letting the store distinguish silent corruption from tampering.

use sha2::{Digest, Sha256};

use crate::types::DIGEST_LENGTH;

/// SHA-256 digest of a plaintext payload, computed before encryption.
pub fn digest(plaintext: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    hasher.finalize().into()
}

/// Verify a plaintext against its expected digest.
///
/// Comparison is constant-time: every byte is visited regardless of where
/// the first mismatch occurs.
pub fn verify(plaintext: &[u8], expected: &[u8]) -> bool {
    let actual = digest(plaintext);
    if expected.len() != DIGEST_LENGTH {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in actual.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
