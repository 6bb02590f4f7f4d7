//! Domain event system — decoupled observation of agent runs.
//!
//! The agent loop publishes events as it reasons and dispatches tools.
//! Observers (logging sinks, tests) subscribe without coupling to the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The reasoning service answered one step
    ResponseGenerated {
        conversation_id: String,
        model: String,
        tool_calls: usize,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolExecuted {
        conversation_id: String,
        tool_name: String,
        call_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A run finished with a final answer
    RunCompleted {
        conversation_id: String,
        rounds: u32,
        timestamp: DateTime<Utc>,
    },

    /// A run was aborted
    RunFailed {
        conversation_id: String,
        error_message: String,
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
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
