//! Store configuration.

use std::time::Duration;

/// Configuration for one `SecureStore` instance (one logical namespace).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix applied to every storage key to avoid collisions with
    /// unrelated stored data.
    pub namespace: String,
    /// Maximum payload size accepted by the size-limit validation check.
    pub max_payload_bytes: usize,
    /// Period between automatic key rotations.
    pub rotation_interval: Duration,
    /// Bounded attempts when re-encrypting a record during rotation.
    pub max_reencrypt_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "medlock".to_string(),
            max_payload_bytes: 1024 * 1024,
            rotation_interval: Duration::from_secs(30 * 24 * 60 * 60),
            max_reencrypt_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quota_is_one_mebibyte() {
        let config = StoreConfig::default();
        assert_eq!(config.max_payload_bytes, 1_048_576);
    }

    #[test]
    fn default_rotation_interval_is_thirty_days() {
        let config = StoreConfig::default();
        assert_eq!(config.rotation_interval, Duration::from_secs(2_592_000));
    }
}
