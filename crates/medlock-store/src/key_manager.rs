//! Key lifecycle management.
//!
//! Owns the active key and any retired keys still needed to decrypt old
//! records. Material lives in the keystore; this module tracks identity
//! and status in a small index persisted through keystore metadata.
//!
//! Invariant: exactly one key is `Active` at any time. A retired key is
//! destroyed only once no record references it; `destroy_key` enforces
//! that through the `KeyUsage` capability rather than trusting callers.

use std::sync::Arc;

use chrono::Utc;
use medlock_crypto::{generate_key, KeyMaterial};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::keystore::Keystore;
use crate::types::{KeyEntry, KeyId, KeyStatus};

const KEY_INDEX_META: &str = "key-index";

/// Answers whether any stored record still references a key.
/// Implemented by the secure record store.
pub trait KeyUsage {
    fn is_key_referenced(&self, key_id: &KeyId) -> Result<bool>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyIndex {
    active: Option<KeyId>,
    keys: Vec<KeyEntry>,
}

pub struct KeyManager {
    keystore: Arc<dyn Keystore>,
    index: Mutex<KeyIndex>,
}

impl KeyManager {
    /// Load the key index from the keystore, starting empty if none exists.
    pub fn new(keystore: Arc<dyn Keystore>) -> Result<Self> {
        let index = match keystore.get_meta(KEY_INDEX_META)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| StoreError::StorageOperationFailed(format!("key index: {}", e)))?,
            None => KeyIndex::default(),
        };
        Ok(Self {
            keystore,
            index: Mutex::new(index),
        })
    }

    fn persist_index(&self, index: &KeyIndex) -> Result<()> {
        let json = serde_json::to_string(index)
            .map_err(|e| StoreError::StorageOperationFailed(format!("key index: {}", e)))?;
        self.keystore.set_meta(KEY_INDEX_META, &json)
    }

    /// Generate a fresh key, store its material, and mark it active.
    /// Caller holds the index lock and persists the index afterwards.
    fn install_new_key(&self, index: &mut KeyIndex) -> Result<(KeyId, KeyMaterial)> {
        let material =
            generate_key().map_err(|e| StoreError::KeyGenerationFailed(e.to_string()))?;
        let key_id = KeyId::generate();
        self.keystore.put_key(&key_id, &material)?;
        index.keys.push(KeyEntry {
            key_id: key_id.clone(),
            created_at: Utc::now(),
            status: KeyStatus::Active,
        });
        index.active = Some(key_id.clone());
        Ok((key_id, material))
    }

    /// Current active key, generated on first use.
    pub fn active_key(&self) -> Result<(KeyId, KeyMaterial)> {
        let mut index = self.index.lock();

        if let Some(active_id) = index.active.clone() {
            let material = self.keystore.get_key(&active_id)?.ok_or_else(|| {
                StoreError::StorageOperationFailed(format!(
                    "material for active key {} missing from keystore",
                    active_id
                ))
            })?;
            return Ok((active_id, material));
        }

        let (key_id, material) = self.install_new_key(&mut index)?;
        self.persist_index(&index)?;
        info!(key_id = %key_id, "generated initial encryption key");
        Ok((key_id, material))
    }

    /// Material for a specific key, retired keys included. Records stay
    /// decryptable under their original key until rotation migrates them.
    pub fn material_for(&self, key_id: &KeyId) -> Result<KeyMaterial> {
        {
            let index = self.index.lock();
            let entry = index
                .keys
                .iter()
                .find(|e| &e.key_id == key_id)
                .ok_or_else(|| {
                    StoreError::StorageOperationFailed(format!("unknown key {}", key_id))
                })?;
            if entry.status == KeyStatus::Destroyed {
                return Err(StoreError::StorageOperationFailed(format!(
                    "key {} has been destroyed",
                    key_id
                )));
            }
        }
        self.keystore.get_key(key_id)?.ok_or_else(|| {
            StoreError::StorageOperationFailed(format!(
                "material for key {} missing from keystore",
                key_id
            ))
        })
    }

    /// Generate a new active key and retire the previous one. Does not
    /// re-encrypt existing records; the rotation scheduler drives that.
    ///
    /// The whole read-previous/generate/retire sequence runs under one
    /// acquisition of the index lock, so concurrent rotations cannot both
    /// observe the same predecessor and strand an extra key in `Active`.
    pub fn rotate(&self) -> Result<KeyId> {
        let mut index = self.index.lock();

        // First use: rotation composes with an empty index.
        let previous_id = match index.active.clone() {
            Some(id) => id,
            None => self.install_new_key(&mut index)?.0,
        };

        let (new_id, _) = self.install_new_key(&mut index)?;
        if let Some(entry) = index.keys.iter_mut().find(|e| e.key_id == previous_id) {
            entry.status = KeyStatus::Retired;
        }
        self.persist_index(&index)?;
        info!(new_key = %new_id, retired_key = %previous_id, "rotated encryption key");
        Ok(new_id)
    }

    /// Wipe a key's material. Fails with `KeyInUse` while any record still
    /// references the key, and refuses to destroy the active key.
    pub fn destroy_key(&self, key_id: &KeyId, usage: &dyn KeyUsage) -> Result<()> {
        if usage.is_key_referenced(key_id)? {
            return Err(StoreError::KeyInUse {
                key_id: key_id.clone(),
            });
        }

        let mut index = self.index.lock();
        let entry = index
            .keys
            .iter_mut()
            .find(|e| &e.key_id == key_id)
            .ok_or_else(|| StoreError::StorageOperationFailed(format!("unknown key {}", key_id)))?;
        if entry.status == KeyStatus::Active {
            return Err(StoreError::InvalidInput(
                "cannot destroy the active key".to_string(),
            ));
        }
        if entry.status == KeyStatus::Destroyed {
            return Ok(());
        }

        self.keystore.delete_key(key_id)?;
        entry.status = KeyStatus::Destroyed;
        self.persist_index(&index)?;
        info!(key_id = %key_id, "destroyed retired key material");
        Ok(())
    }

    /// Whether any retired key still holds material. Audit hook: after a
    /// completed rotation pass this returns false.
    pub fn has_retired_keys(&self) -> bool {
        self.index
            .lock()
            .keys
            .iter()
            .any(|e| e.status == KeyStatus::Retired)
    }

    pub fn retired_key_ids(&self) -> Vec<KeyId> {
        self.index
            .lock()
            .keys
            .iter()
            .filter(|e| e.status == KeyStatus::Retired)
            .map(|e| e.key_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryKeystore;

    struct NoRecords;
    impl KeyUsage for NoRecords {
        fn is_key_referenced(&self, _key_id: &KeyId) -> Result<bool> {
            Ok(false)
        }
    }

    struct AllReferenced;
    impl KeyUsage for AllReferenced {
        fn is_key_referenced(&self, _key_id: &KeyId) -> Result<bool> {
            Ok(true)
        }
    }

    fn manager() -> (Arc<MemoryKeystore>, KeyManager) {
        let keystore = Arc::new(MemoryKeystore::new());
        let manager = KeyManager::new(keystore.clone()).unwrap();
        (keystore, manager)
    }

    #[test]
    fn generates_key_on_first_use() {
        let (_, manager) = manager();
        let (id_a, material_a) = manager.active_key().unwrap();
        let (id_b, material_b) = manager.active_key().unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(material_a.as_bytes(), material_b.as_bytes());
    }

    #[test]
    fn rotate_retires_previous_key() {
        let (_, manager) = manager();
        let (old_id, _) = manager.active_key().unwrap();
        let new_id = manager.rotate().unwrap();

        assert_ne!(old_id, new_id);
        assert_eq!(manager.active_key().unwrap().0, new_id);
        assert!(manager.has_retired_keys());
        assert_eq!(manager.retired_key_ids(), vec![old_id.clone()]);

        // Retired key material is still available for decryption.
        assert!(manager.material_for(&old_id).is_ok());
    }

    #[test]
    fn destroy_referenced_key_fails() {
        let (_, manager) = manager();
        let (old_id, _) = manager.active_key().unwrap();
        manager.rotate().unwrap();

        let err = manager.destroy_key(&old_id, &AllReferenced).unwrap_err();
        assert!(matches!(err, StoreError::KeyInUse { .. }));
        assert!(manager.material_for(&old_id).is_ok());
    }

    #[test]
    fn destroy_unreferenced_key_wipes_material() {
        let (keystore, manager) = manager();
        let (old_id, _) = manager.active_key().unwrap();
        manager.rotate().unwrap();

        manager.destroy_key(&old_id, &NoRecords).unwrap();
        assert!(!manager.has_retired_keys());
        assert!(manager.material_for(&old_id).is_err());
        assert!(keystore.get_key(&old_id).unwrap().is_none());

        // Destroying again is a no-op.
        manager.destroy_key(&old_id, &NoRecords).unwrap();
    }

    #[test]
    fn cannot_destroy_active_key() {
        let (_, manager) = manager();
        let (active_id, _) = manager.active_key().unwrap();
        let err = manager.destroy_key(&active_id, &NoRecords).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn concurrent_rotations_retire_every_previous_key() {
        let (_, manager) = manager();
        manager.active_key().unwrap();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        manager.rotate().unwrap();
                    }
                });
            }
        });

        // 1 initial key + 100 rotations: everything except the final
        // active key must be retired, none stranded in active status.
        assert_eq!(manager.retired_key_ids().len(), 100);
        let (active_id, _) = manager.active_key().unwrap();
        assert!(!manager.retired_key_ids().contains(&active_id));
    }

    #[test]
    fn rotate_on_empty_index_creates_and_retires_initial_key() {
        let (_, manager) = manager();
        let new_id = manager.rotate().unwrap();
        assert_eq!(manager.active_key().unwrap().0, new_id);
        assert_eq!(manager.retired_key_ids().len(), 1);
    }

    #[test]
    fn index_survives_restart() {
        let keystore = Arc::new(MemoryKeystore::new());
        let first = KeyManager::new(keystore.clone()).unwrap();
        let (id, _) = first.active_key().unwrap();
        drop(first);

        let second = KeyManager::new(keystore).unwrap();
        assert_eq!(second.active_key().unwrap().0, id);
    }

    #[test]
    fn locked_keystore_surfaces_retryable_error() {
        let (keystore, manager) = manager();
        manager.active_key().unwrap();

        keystore.set_locked(true);
        let err = manager.active_key().unwrap_err();
        assert!(err.is_retryable());

        keystore.set_locked(false);
        assert!(manager.active_key().is_ok());
    }
}
