//! Record persistence backends.
//!
//! The secure record store orchestrates crypto and policy; actual
//! persistence sits behind `RecordBackend` so targets can swap the
//! implementation (in-memory, SQLite, platform storage).

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use crate::error::Result;
use crate::types::{EncryptedRecord, KeyId};

/// Storage for encrypted records, keyed by namespaced storage key.
pub trait RecordBackend: Send + Sync {
    fn get(&self, storage_key: &str) -> Result<Option<EncryptedRecord>>;

    /// Insert or replace a record. The replace must be atomic: a reader
    /// never observes a partially written record.
    fn put(&self, record: &EncryptedRecord) -> Result<()>;

    /// Delete a record. Idempotent.
    fn delete(&self, storage_key: &str) -> Result<()>;

    /// Delete every record whose storage key starts with `prefix`.
    fn clear(&self, prefix: &str) -> Result<()>;

    /// Storage keys under `prefix`.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Storage keys under `prefix` whose record is encrypted with `key_id`.
    /// Rotation bookkeeping.
    fn keys_for(&self, key_id: &KeyId, prefix: &str) -> Result<Vec<String>>;
}
