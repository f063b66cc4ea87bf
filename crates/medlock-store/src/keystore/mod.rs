//! Keystore abstraction for key material.
//!
//! The key manager is written against this trait only; platform-backed
//! implementations (Keychain, secure enclave, TPM) plug in behind it.
//! Material is keyed by `KeyId` and is never co-located with ciphertext
//! records.

pub mod file;
pub mod memory;

pub use file::FileKeystore;
pub use memory::MemoryKeystore;

use medlock_crypto::KeyMaterial;

use crate::error::Result;
use crate::types::KeyId;

/// Opaque key-blob storage plus a small metadata table for the key index.
///
/// Implementations surface `StoreError::KeystoreUnavailable` when the
/// backing store is temporarily inaccessible (device locked, permissions
/// revoked); callers treat that class as retryable.
pub trait Keystore: Send + Sync {
    fn put_key(&self, key_id: &KeyId, material: &KeyMaterial) -> Result<()>;

    fn get_key(&self, key_id: &KeyId) -> Result<Option<KeyMaterial>>;

    /// Remove a key blob. Idempotent.
    fn delete_key(&self, key_id: &KeyId) -> Result<()>;

    fn get_meta(&self, name: &str) -> Result<Option<String>>;

    fn set_meta(&self, name: &str, value: &str) -> Result<()>;
}
