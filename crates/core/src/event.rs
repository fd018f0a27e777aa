//! Domain events: what happened during a gate cycle.
//!
//! The gate publishes events as it moves through its states. The operator
//! monitor, the CLI and tests subscribe without the gate knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::draft::Outcome;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The responder produced a draft
    DraftGenerated {
        session_id: String,
        attempt: u32,
        chars: usize,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// The evaluator judged a draft
    VerdictIssued {
        session_id: String,
        attempt: u32,
        outcome: Outcome,
        feedback: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool ran (or was served from the cycle cache)
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        deduplicated: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A backend call failed or timed out
    BackendFailure {
        session_id: String,
        stage: String, // "generation", "evaluation"
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A reply left the gate
    TurnCompleted {
        session_id: String,
        attempts: u32,
        forced_accept: bool,
        degraded: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
