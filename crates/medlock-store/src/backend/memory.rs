//! In-memory record backend.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::Result;
use crate::types::{EncryptedRecord, KeyId};

use super::RecordBackend;

#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, EncryptedRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordBackend for MemoryBackend {
    fn get(&self, storage_key: &str) -> Result<Option<EncryptedRecord>> {
        Ok(self.records.lock().get(storage_key).cloned())
    }

    fn put(&self, record: &EncryptedRecord) -> Result<()> {
        self.records
            .lock()
            .insert(record.storage_key.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, storage_key: &str) -> Result<()> {
        self.records.lock().remove(storage_key);
        Ok(())
    }

    fn clear(&self, prefix: &str) -> Result<()> {
        self.records
            .lock()
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .records
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn keys_for(&self, key_id: &KeyId, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .records
            .lock()
            .values()
            .filter(|record| &record.key_id == key_id && record.storage_key.starts_with(prefix))
            .map(|record| record.storage_key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
