//! Background key rotation.
//!
//! Drives the `Idle -> Rotating -> ReEncrypting -> Idle` cycle: rotate the
//! active key, migrate every record still encrypted under a retired key,
//! then destroy the retired key once nothing references it. A record that
//! fails re-encryption is retried a bounded number of times and picked up
//! again on the next pass; its key is never destroyed while it waits.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::key_manager::KeyManager;
use crate::store::SecureStore;
use crate::types::KeyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Rotating,
    ReEncrypting,
}

/// Outcome of one rotation pass.
#[derive(Debug, Clone)]
pub struct RotationReport {
    pub new_key: KeyId,
    pub migrated: usize,
    pub failed: usize,
    pub destroyed_keys: usize,
}

pub struct RotationScheduler {
    store: Arc<SecureStore>,
    keys: Arc<KeyManager>,
    max_attempts: u32,
    interval: std::time::Duration,
    state: Mutex<RotationState>,
}

impl RotationScheduler {
    pub fn new(store: Arc<SecureStore>, keys: Arc<KeyManager>, config: &StoreConfig) -> Self {
        Self {
            store,
            keys,
            max_attempts: config.max_reencrypt_attempts.max(1),
            interval: config.rotation_interval,
            state: Mutex::new(RotationState::Idle),
        }
    }

    pub fn state(&self) -> RotationState {
        *self.state.lock()
    }

    /// Run one full rotation pass. Also the explicit-trigger entry point.
    pub fn rotate_once(&self) -> Result<RotationReport> {
        let result = self.rotate_inner();
        *self.state.lock() = RotationState::Idle;
        result
    }

    fn rotate_inner(&self) -> Result<RotationReport> {
        *self.state.lock() = RotationState::Rotating;
        let new_key = self.keys.rotate()?;

        *self.state.lock() = RotationState::ReEncrypting;
        let mut report = RotationReport {
            new_key,
            migrated: 0,
            failed: 0,
            destroyed_keys: 0,
        };

        for retired in self.keys.retired_key_ids() {
            let records = self.store.records_using_key(&retired).map_err(|e| {
                StoreError::SynchronizationFailed(format!(
                    "enumerating records under key {}: {}",
                    retired, e
                ))
            })?;

            for key in records {
                if self.reencrypt_with_retries(&key) {
                    report.migrated += 1;
                } else {
                    report.failed += 1;
                }
            }

            // Destroy only once every record has moved off the key; a
            // straggler keeps the key retired until the next pass.
            match self.keys.destroy_key(&retired, self.store.as_ref()) {
                Ok(()) => report.destroyed_keys += 1,
                Err(StoreError::KeyInUse { key_id }) => {
                    warn!(key_id = %key_id, "retired key still referenced, deferring destroy");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            new_key = %report.new_key,
            migrated = report.migrated,
            failed = report.failed,
            destroyed_keys = report.destroyed_keys,
            "rotation pass complete"
        );
        Ok(report)
    }

    fn reencrypt_with_retries(&self, key: &str) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.store.reencrypt(key) {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        storage_key = %key,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "re-encryption attempt failed"
                    );
                }
            }
        }
        false
    }

    /// Periodic driver: one rotation pass per configured interval. The
    /// first pass fires after a full interval, not at startup.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval's first tick completes immediately; consume it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.rotate_once() {
                warn!(error = %e, "scheduled key rotation failed");
            }
        }
    }
}
