//! # Audit Sink
//!
//! Workflows report what they committed to an [`AuditSink`].
//!
//! ```text
//!   workflow ── tx.commit() ──► sink.record(AuditEvent)
//!                                   │
//!                                   ├── TracingAuditSink  → info! on folio::audit
//!                                   └── MemoryAuditSink   → Vec<AuditEvent>
//! ```
//!
//! Recording happens after commit and cannot fail the workflow.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use folio_core::Actor;

/// One committed business action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub actor_id: i64,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Builds an event; the actor's role is folded into `details`.
    pub fn new(actor: Actor, action: &str, entity_type: &str, entity_id: i64, details: Value) -> Self {
        let details = match details {
            Value::Object(mut map) => {
                map.insert("role".to_string(), serde_json::json!(actor.role));
                Value::Object(map)
            }
            other => serde_json::json!({ "role": actor.role, "data": other }),
        };

        AuditEvent {
            actor_id: actor.user_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Receiver for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes each event as a structured log record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "folio::audit",
            actor_id = event.actor_id,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = event.entity_id,
            details = %event.details,
            "audit"
        );
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Actions in recording order.
    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
