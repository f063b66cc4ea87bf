//! Encrypted-at-rest record storage.
//!
//! A `SecureStore` accepts opaque payloads under logical keys and persists
//! them AES-256-GCM encrypted, integrity-digested, and audited. Key
//! lifecycle (generation, rotation, destruction) is owned by `KeyManager`
//! over a pluggable `Keystore`; records persist through a pluggable
//! `RecordBackend`; `RotationScheduler` migrates records to fresh keys on
//! a timer.
//!
//! Instances are constructed explicitly and dependency-injected: build the
//! keystore, key manager, backend, and store once at startup and share
//! them via `Arc`. There are no process-wide singletons.

pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod key_manager;
pub mod keystore;
pub mod rotation;
pub mod store;
pub mod types;
pub mod validation;

pub use audit::{AuditEvent, AuditLog, AuditOutcome, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use backend::{MemoryBackend, RecordBackend};
#[cfg(feature = "sqlite")]
pub use backend::SqliteBackend;
pub use config::StoreConfig;
pub use error::{Result, StoreError, ValidationCheck};
pub use key_manager::{KeyManager, KeyUsage};
pub use keystore::{FileKeystore, Keystore, MemoryKeystore};
pub use rotation::{RotationReport, RotationScheduler, RotationState};
pub use store::SecureStore;
pub use types::{EncryptedRecord, KeyEntry, KeyId, KeyStatus, Operation, ValidationOptions};
