//! The secure record store façade.
//!
//! Orchestrates validation, integrity digests, encryption, and persistence
//! behind a narrow save/load/update/remove/clear contract. Every operation
//! is audited; no operation partially persists.
//!
//! Operations serialize under one internal mutex per store instance, and
//! one instance owns one namespace, so concurrent writes to the same
//! logical key cannot race. Stores over different namespaces are
//! independent and may run concurrently.

use std::sync::Arc;

use chrono::Utc;
use medlock_crypto::{self as crypto, CryptoError, EncryptionContext};
use parking_lot::Mutex;
use tracing::debug;

use crate::audit::{AuditLog, AuditOutcome, AuditSink};
use crate::backend::RecordBackend;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::key_manager::{KeyManager, KeyUsage};
use crate::types::{EncryptedRecord, KeyId, Operation, ValidationOptions};
use crate::validation;

pub struct SecureStore {
    config: StoreConfig,
    keys: Arc<KeyManager>,
    backend: Arc<dyn RecordBackend>,
    audit: AuditLog,
    // Serializes record operations within this namespace.
    op_lock: Mutex<()>,
}

impl SecureStore {
    pub fn new(
        config: StoreConfig,
        keys: Arc<KeyManager>,
        backend: Arc<dyn RecordBackend>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            keys,
            backend,
            audit: AuditLog::new(audit_sink),
            op_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn prefix(&self) -> String {
        format!("{}/", self.config.namespace)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}/{}", self.config.namespace, key)
    }

    fn audit_outcome<T>(&self, operation: Operation, key: &str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => AuditOutcome::Success,
            Err(e) => AuditOutcome::Failure(e.code().to_string()),
        };
        self.audit.emit(operation, key, outcome);
    }

    /// Encrypt and persist a payload under a logical key.
    pub fn save(&self, key: &str, payload: &[u8], options: &ValidationOptions) -> Result<()> {
        let result = {
            let _guard = self.op_lock.lock();
            self.write_locked(key, payload, options)
        };
        self.audit_outcome(Operation::Save, key, &result);
        result
    }

    /// Same pipeline as `save`; replaces the existing record atomically.
    /// The previous ciphertext stays readable until the new record lands.
    pub fn update(&self, key: &str, payload: &[u8], options: &ValidationOptions) -> Result<()> {
        let result = {
            let _guard = self.op_lock.lock();
            self.write_locked(key, payload, options)
        };
        self.audit_outcome(Operation::Update, key, &result);
        result
    }

    /// Decrypt and return a stored payload.
    pub fn load(&self, key: &str) -> Result<Vec<u8>> {
        let result = {
            let _guard = self.op_lock.lock();
            self.load_locked(key)
        };
        self.audit_outcome(Operation::Load, key, &result);
        result
    }

    /// Delete one record. Succeeds even if the key does not exist.
    pub fn remove(&self, key: &str) -> Result<()> {
        let result = {
            let _guard = self.op_lock.lock();
            self.backend.delete(&self.namespaced(key))
        };
        self.audit_outcome(Operation::Remove, key, &result);
        result
    }

    /// Delete every record in this store's namespace.
    pub fn clear(&self) -> Result<()> {
        let result = {
            let _guard = self.op_lock.lock();
            self.backend.clear(&self.prefix())
        };
        self.audit_outcome(Operation::Clear, "*", &result);
        result
    }

    /// Logical keys of records encrypted under `key_id`. Rotation
    /// bookkeeping.
    pub fn records_using_key(&self, key_id: &KeyId) -> Result<Vec<String>> {
        let prefix = self.prefix();
        let keys = self.backend.keys_for(key_id, &prefix)?;
        Ok(keys
            .into_iter()
            .map(|k| k[prefix.len()..].to_string())
            .collect())
    }

    /// Re-encrypt one record under the current active key, holding the
    /// operation lock across the read and the write.
    pub fn reencrypt(&self, key: &str) -> Result<()> {
        let result = {
            let _guard = self.op_lock.lock();
            self.reencrypt_locked(key)
        };
        self.audit_outcome(Operation::Rotate, key, &result);
        result
    }

    fn write_locked(
        &self,
        key: &str,
        payload: &[u8],
        options: &ValidationOptions,
    ) -> Result<()> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "storage key must be non-empty".to_string(),
            ));
        }

        validation::run_checks(payload, options, &self.config)?;

        let digest = options
            .integrity_check
            .then(|| crypto::digest(payload).to_vec());

        let (key_id, material) = self.keys.active_key()?;
        let context = self.context_for(key);
        let blob = crypto::encrypt(payload, &material, &context).map_err(|e| {
            StoreError::EncryptionFailed {
                storage_key: key.to_string(),
                detail: e.to_string(),
            }
        })?;

        let storage_key = self.namespaced(key);
        let now = Utc::now();
        let created_at = match self.backend.get(&storage_key)? {
            Some(existing) => existing.created_at,
            None => now,
        };

        // The record is fully formed before the backend sees it; `put` is
        // an atomic replace, so a failure leaves the old record intact.
        let record = EncryptedRecord {
            storage_key,
            key_id,
            blob,
            digest,
            created_at,
            last_modified_at: now,
        };
        self.backend.put(&record)?;
        debug!(storage_key = %key, bytes = payload.len(), "record persisted");
        Ok(())
    }

    fn load_locked(&self, key: &str) -> Result<Vec<u8>> {
        let storage_key = self.namespaced(key);
        let record = self
            .backend
            .get(&storage_key)?
            .ok_or_else(|| StoreError::DataNotFound {
                storage_key: key.to_string(),
            })?;

        // Retired keys are retained precisely so this lookup still works
        // for records not yet migrated to the active key.
        let material = self.keys.material_for(&record.key_id)?;
        let context = self.context_for(key);
        let plaintext =
            crypto::decrypt(&record.blob, &material, &context).map_err(|e| match e {
                CryptoError::AuthenticationFailed => StoreError::AuthenticationFailed {
                    storage_key: key.to_string(),
                },
                CryptoError::DataTooShort | CryptoError::UnsupportedVersion(_) => {
                    StoreError::DataCorrupted {
                        storage_key: key.to_string(),
                    }
                }
                other => StoreError::EncryptionFailed {
                    storage_key: key.to_string(),
                    detail: other.to_string(),
                },
            })?;

        if let Some(expected) = &record.digest {
            if !crypto::verify(&plaintext, expected) {
                return Err(StoreError::DataCorrupted {
                    storage_key: key.to_string(),
                });
            }
        }

        Ok(plaintext)
    }

    fn reencrypt_locked(&self, key: &str) -> Result<()> {
        let storage_key = self.namespaced(key);
        let record = self
            .backend
            .get(&storage_key)?
            .ok_or_else(|| StoreError::DataNotFound {
                storage_key: key.to_string(),
            })?;

        let plaintext = self.load_locked(key)?;

        let (active_id, material) = self.keys.active_key()?;
        if active_id == record.key_id {
            return Ok(());
        }

        let context = self.context_for(key);
        let blob = crypto::encrypt(&plaintext, &material, &context).map_err(|e| {
            StoreError::EncryptionFailed {
                storage_key: key.to_string(),
                detail: e.to_string(),
            }
        })?;

        let migrated = EncryptedRecord {
            storage_key,
            key_id: active_id,
            blob,
            digest: record.digest.clone(),
            created_at: record.created_at,
            last_modified_at: Utc::now(),
        };
        self.backend.put(&migrated)?;
        debug!(storage_key = %key, "record re-encrypted under active key");
        Ok(())
    }

    fn context_for(&self, key: &str) -> EncryptionContext {
        EncryptionContext {
            namespace: self.config.namespace.clone(),
            storage_key: key.to_string(),
        }
    }

    /// Retry buffered audit events against the sink.
    pub fn flush_audit_fallback(&self) {
        self.audit.flush_fallback();
    }
}

impl KeyUsage for SecureStore {
    fn is_key_referenced(&self, key_id: &KeyId) -> Result<bool> {
        Ok(!self.backend.keys_for(key_id, &self.prefix())?.is_empty())
    }
}
