//! Audit logging of store operations.
//!
//! Every operation emits one structured event: operation, logical storage
//! key, outcome, timestamp. Never plaintext, never key material. Emission
//! is fire-and-forget: a failing sink can never fail or block the primary
//! operation; rejected events land in a bounded local fallback buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::types::Operation;

/// Events the fallback buffer retains when the sink is down.
const FALLBACK_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// Carries the stable error code only, never error detail.
    Failure(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub operation: Operation,
    pub storage_key: String,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Receives audit events. Implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), String>;
}

/// Default sink: emits events through `tracing`.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), String> {
        match &event.outcome {
            AuditOutcome::Success => {
                info!(
                    operation = event.operation.as_str(),
                    storage_key = %event.storage_key,
                    outcome = "success",
                    "audit"
                );
            }
            AuditOutcome::Failure(code) => {
                info!(
                    operation = event.operation.as_str(),
                    storage_key = %event.storage_key,
                    outcome = "failure",
                    error = %code,
                    "audit"
                );
            }
        }
        Ok(())
    }
}

/// Test sink: collects events into a shared log.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), String> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget front of the audit pipeline.
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
    fallback: Mutex<VecDeque<AuditEvent>>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            fallback: Mutex::new(VecDeque::new()),
        }
    }

    /// Emit an event. Sink failures are buffered locally, oldest dropped
    /// first once the buffer is full.
    pub fn emit(&self, operation: Operation, storage_key: &str, outcome: AuditOutcome) {
        let event = AuditEvent {
            operation,
            storage_key: storage_key.to_string(),
            outcome,
            timestamp: Utc::now(),
        };
        if let Err(reason) = self.sink.record(&event) {
            warn!(reason = %reason, "audit sink rejected event, buffering locally");
            let mut fallback = self.fallback.lock();
            if fallback.len() == FALLBACK_CAPACITY {
                fallback.pop_front();
            }
            fallback.push_back(event);
        }
    }

    /// Retry buffered events against the sink. Events the sink still
    /// rejects stay buffered.
    pub fn flush_fallback(&self) {
        let mut fallback = self.fallback.lock();
        while let Some(event) = fallback.front() {
            if self.sink.record(event).is_err() {
                break;
            }
            fallback.pop_front();
        }
    }

    pub fn buffered(&self) -> usize {
        self.fallback.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Sink that fails while `down` is set.
    #[derive(Default)]
    struct FlakySink {
        down: AtomicBool,
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for FlakySink {
        fn record(&self, event: &AuditEvent) -> Result<(), String> {
            if self.down.load(Ordering::SeqCst) {
                return Err("sink offline".to_string());
            }
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn successful_emit_reaches_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = AuditLog::new(sink.clone());
        log.emit(Operation::Save, "profile", AuditOutcome::Success);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].operation, Operation::Save);
        assert_eq!(events[0].storage_key, "profile");
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(log.buffered(), 0);
    }

    #[test]
    fn sink_failure_buffers_event() {
        let sink = Arc::new(FlakySink::default());
        sink.down.store(true, Ordering::SeqCst);
        let log = AuditLog::new(sink.clone());

        log.emit(Operation::Load, "profile", AuditOutcome::Success);
        assert_eq!(log.buffered(), 1);
        assert!(sink.events.lock().is_empty());

        sink.down.store(false, Ordering::SeqCst);
        log.flush_fallback();
        assert_eq!(log.buffered(), 0);
        assert_eq!(sink.events.lock().len(), 1);
    }

    #[test]
    fn fallback_buffer_is_bounded() {
        let sink = Arc::new(FlakySink::default());
        sink.down.store(true, Ordering::SeqCst);
        let log = AuditLog::new(sink);

        for i in 0..FALLBACK_CAPACITY + 10 {
            log.emit(Operation::Save, &format!("key-{}", i), AuditOutcome::Success);
        }
        assert_eq!(log.buffered(), FALLBACK_CAPACITY);
    }

    #[test]
    fn failure_outcome_carries_code_only() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = AuditLog::new(sink.clone());
        log.emit(
            Operation::Load,
            "profile",
            AuditOutcome::Failure("data-not-found".to_string()),
        );
        assert_eq!(
            sink.events()[0].outcome,
            AuditOutcome::Failure("data-not-found".to_string())
        );
    }
}
