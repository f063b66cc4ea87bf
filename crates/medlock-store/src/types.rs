//! Core data model: key identity and lifecycle, encrypted records, and
//! per-call validation options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for an encryption key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle status of an encryption key.
///
/// Exactly one key is `Active` at any time. `Retired` keys decrypt old
/// records until rotation migrates them; `Destroyed` keys have had their
/// material wiped from the keystore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    Active,
    Retired,
    Destroyed,
}

/// Key metadata tracked by the key manager. Material lives only in the
/// keystore, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key_id: KeyId,
    pub created_at: DateTime<Utc>,
    pub status: KeyStatus,
}

/// A persisted encrypted record.
///
/// `blob` is the versioned cipher output `[version][nonce][ciphertext+tag]`.
/// `digest` is the SHA-256 of the original plaintext, present when the
/// record was saved with the integrity check enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub storage_key: String,
    pub key_id: KeyId,
    pub blob: Vec<u8>,
    pub digest: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

/// Pre-encryption checks enabled for a save/update call.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Heuristic scan for plaintext identifiers (SSN, card numbers) that
    /// should not be stored as free-form payload.
    pub sensitive_data_check: bool,
    /// Enforce the configured payload quota.
    pub size_limit: bool,
    /// Require the payload to parse as JSON.
    pub format_validation: bool,
    /// Compute and store a plaintext digest, verified on every load.
    pub integrity_check: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            sensitive_data_check: false,
            size_limit: true,
            format_validation: false,
            integrity_check: true,
        }
    }
}

/// Store operation, as reported to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Save,
    Load,
    Update,
    Remove,
    Clear,
    Rotate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Save => "save",
            Operation::Load => "load",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Clear => "clear",
            Operation::Rotate => "rotate",
        }
    }
}
