//! Pre-encryption payload validation.
//!
//! Checks run in a fixed order (size, sensitive data, format); the first
//! failing enabled check short-circuits before any encryption happens.

use std::sync::OnceLock;

use regex::bytes::Regex;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError, ValidationCheck};
use crate::types::ValidationOptions;

/// Patterns that indicate raw identifiers a caller should never store as
/// free-form payload: US SSNs and 13-16 digit card numbers.
fn sensitive_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid SSN pattern"),
            Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("valid card pattern"),
        ]
    })
}

/// Run every enabled check against a payload.
pub fn run_checks(
    payload: &[u8],
    options: &ValidationOptions,
    config: &StoreConfig,
) -> Result<()> {
    if options.size_limit && payload.len() > config.max_payload_bytes {
        return Err(StoreError::ValidationFailed {
            check: ValidationCheck::SizeLimit,
            reason: format!(
                "payload is {} bytes, quota is {} bytes",
                payload.len(),
                config.max_payload_bytes
            ),
        });
    }

    if options.sensitive_data_check {
        for pattern in sensitive_patterns() {
            if pattern.is_match(payload) {
                // Report which class of pattern matched, never the match.
                return Err(StoreError::ValidationFailed {
                    check: ValidationCheck::SensitiveData,
                    reason: "payload matches a sensitive identifier pattern".to_string(),
                });
            }
        }
    }

    if options.format_validation {
        serde_json::from_slice::<serde_json::Value>(payload).map_err(|_| {
            StoreError::ValidationFailed {
                check: ValidationCheck::Format,
                reason: "payload is not valid JSON".to_string(),
            }
        })?;
    }

    Ok(())
}
