use thiserror::Error;

use crate::types::KeyId;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Which validation check rejected a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCheck {
    SensitiveData,
    SizeLimit,
    Format,
}

impl std::fmt::Display for ValidationCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationCheck::SensitiveData => "sensitive-data",
            ValidationCheck::SizeLimit => "size-limit",
            ValidationCheck::Format => "format",
        };
        f.write_str(name)
    }
}

/// Unified error taxonomy for the secure storage subsystem.
///
/// Error detail carries the logical storage key and operation context but
/// never payload bytes or key material.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed ({check}): {reason}")]
    ValidationFailed {
        check: ValidationCheck,
        reason: String,
    },

    #[error("Encryption failed for '{storage_key}': {detail}")]
    EncryptionFailed {
        storage_key: String,
        detail: String,
    },

    /// AEAD tag mismatch on decrypt. Treated as a potential tamper event;
    /// never retried silently.
    #[error("Authentication failed for '{storage_key}'")]
    AuthenticationFailed { storage_key: String },

    /// Integrity-digest mismatch or a malformed persisted blob.
    #[error("Stored data corrupted for '{storage_key}'")]
    DataCorrupted { storage_key: String },

    #[error("No data found for '{storage_key}'")]
    DataNotFound { storage_key: String },

    /// Keystore inaccessible (device locked, permissions revoked). The
    /// only class callers are expected to retry automatically.
    #[error("Keystore unavailable: {0}")]
    KeystoreUnavailable(String),

    #[error("Key {key_id} is still referenced by stored records")]
    KeyInUse { key_id: KeyId },

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),

    #[error("Synchronization failed: {0}")]
    SynchronizationFailed(String),
}

impl StoreError {
    /// Whether a caller should retry the operation after the underlying
    /// condition clears (e.g. the device unlocks).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::KeystoreUnavailable(_))
    }

    /// Stable short code for audit events. No context, no detail.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidInput(_) => "invalid-input",
            StoreError::ValidationFailed { .. } => "validation-failed",
            StoreError::EncryptionFailed { .. } => "encryption-failed",
            StoreError::AuthenticationFailed { .. } => "authentication-failed",
            StoreError::DataCorrupted { .. } => "data-corrupted",
            StoreError::DataNotFound { .. } => "data-not-found",
            StoreError::KeystoreUnavailable(_) => "keystore-unavailable",
            StoreError::KeyInUse { .. } => "key-in-use",
            StoreError::KeyGenerationFailed(_) => "key-generation-failed",
            StoreError::StorageOperationFailed(_) => "storage-operation-failed",
            StoreError::SynchronizationFailed(_) => "synchronization-failed",
        }
    }
}
