//! # Queue Binding
//!
//! Declarative metadata tying one handler to one queue.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_MESSAGES, TRANSPORT_BATCH_LIMIT};

/// Associates a handler with a queue identifier and a batch-size hint.
///
/// A registration carries exactly one binding, and bindings are never
/// mutated once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueBinding {
    pub queue_id: String,
    /// Upper bound on messages requested per receive call
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
}

fn default_max_messages() -> u32 {
    DEFAULT_MAX_MESSAGES
}

impl QueueBinding {
    /// Bind to `queue_id` with the default batch size of 10
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self {
            queue_id: queue_id.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Batch size actually requested from the transport
    pub fn effective_max_messages(&self) -> u32 {
        self.max_messages.clamp(1, TRANSPORT_BATCH_LIMIT)
    }
}

impl From<&str> for QueueBinding {
    fn from(queue_id: &str) -> Self {
        Self::new(queue_id)
    }
}

impl From<String> for QueueBinding {
    fn from(queue_id: String) -> Self {
        Self::new(queue_id)
    }
}
