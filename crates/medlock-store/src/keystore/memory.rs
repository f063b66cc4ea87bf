//! In-process keystore.
//!
//! Backs tests and single-process deployments. Models the platform's
//! lock semantics: while `set_locked(true)`, every operation fails with
//! the retryable `KeystoreUnavailable`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use medlock_crypto::KeyMaterial;
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::types::KeyId;

use super::Keystore;

#[derive(Default)]
pub struct MemoryKeystore {
    keys: Mutex<HashMap<KeyId, KeyMaterial>>,
    meta: Mutex<HashMap<String, String>>,
    locked: AtomicBool,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the device lock state. While locked, all operations fail
    /// with `KeystoreUnavailable`.
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(StoreError::KeystoreUnavailable(
                "keystore is locked".to_string(),
            ));
        }
        Ok(())
    }
}

impl Keystore for MemoryKeystore {
    fn put_key(&self, key_id: &KeyId, material: &KeyMaterial) -> Result<()> {
        self.check_unlocked()?;
        self.keys.lock().insert(key_id.clone(), material.clone());
        Ok(())
    }

    fn get_key(&self, key_id: &KeyId) -> Result<Option<KeyMaterial>> {
        self.check_unlocked()?;
        Ok(self.keys.lock().get(key_id).cloned())
    }

    fn delete_key(&self, key_id: &KeyId) -> Result<()> {
        self.check_unlocked()?;
        self.keys.lock().remove(key_id);
        Ok(())
    }

    fn get_meta(&self, name: &str) -> Result<Option<String>> {
        self.check_unlocked()?;
        Ok(self.meta.lock().get(name).cloned())
    }

    fn set_meta(&self, name: &str, value: &str) -> Result<()> {
        self.check_unlocked()?;
        self.meta.lock().insert(name.to_string(), value.to_string());
        Ok(())
    }
}
