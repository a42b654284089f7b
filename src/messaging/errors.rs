//! # Messaging Error Types
//!
//! Structured error handling for transport and producer operations using
//! thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors raised by a queue transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport connection error: {message}")]
    Connection { message: String },

    #[error("Queue not found: {queue_id}")]
    QueueNotFound { queue_id: String },

    #[error("Queue operation failed: {queue_id}: {operation}: {message}")]
    QueueOperation {
        queue_id: String,
        operation: String,
        message: String,
    },

    #[error("Invalid request for queue {queue_id}: {reason}")]
    InvalidRequest { queue_id: String, reason: String },
}

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_id: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_id: queue_id.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_id: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_id: queue_id.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(queue_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            queue_id: queue_id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Caller errors raised by the producer before anything is sent.
///
/// Transport failures are not represented here; the producer logs them and
/// reports `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    #[error("FIFO queue {queue_id} requires a message group id")]
    MissingGroupId { queue_id: String },

    #[error("Message batch for queue {queue_id} cannot be empty")]
    EmptyBatch { queue_id: String },

    #[error("Queue identifier cannot be empty")]
    EmptyQueueId,
}

impl ProducerError {
    /// Create a missing group id error
    pub fn missing_group_id(queue_id: impl Into<String>) -> Self {
        Self::MissingGroupId {
            queue_id: queue_id.into(),
        }
    }

    /// Create an empty batch error
    pub fn empty_batch(queue_id: impl Into<String>) -> Self {
        Self::EmptyBatch {
            queue_id: queue_id.into(),
        }
    }
}
