//! # Message Types
//!
//! Transport-agnostic request, response and message types shared by the
//! consumer engine, the producer and every transport implementation.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    self, ALL_ATTRIBUTES, DEFAULT_MAX_MESSAGES, DEFAULT_WAIT_TIME, STATUS_OK,
};

/// Unique identifier assigned to a message by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque handle returned with a received message, required to delete it
///
/// The format is transport-specific:
/// - InMemory: a fresh UUID per receive
/// - pgmq: the message id as string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    /// Create a new receipt handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Try to parse the receipt handle as an i64 (for pgmq)
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReceiptHandle {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReceiptHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// A message received from a queue
///
/// Owned by the polling loop between receive and delete/abandon. The
/// transport remains the store of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned message id
    pub message_id: MessageId,
    /// Handle for acknowledging this message
    pub receipt_handle: ReceiptHandle,
    /// Raw message body
    pub body: String,
    /// System attributes (receive count, group id, sent timestamp)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Application-defined message attributes
    #[serde(default)]
    pub message_attributes: HashMap<String, String>,
}

impl Message {
    /// Create a message with no attributes
    pub fn new(
        message_id: impl Into<MessageId>,
        receipt_handle: impl Into<ReceiptHandle>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            attributes: HashMap::new(),
            message_attributes: HashMap::new(),
        }
    }

    /// Add a system attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add an application message attribute
    pub fn with_message_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.message_attributes.insert(name.into(), value.into());
        self
    }

    /// Message group id, present only for messages from FIFO queues
    pub fn group_id(&self) -> Option<&str> {
        self.attributes
            .get(constants::attributes::MESSAGE_GROUP_ID)
            .map(String::as_str)
    }

    /// Number of times this message has been received, when reported
    pub fn receive_count(&self) -> Option<u32> {
        self.attributes
            .get(constants::attributes::APPROXIMATE_RECEIVE_COUNT)
            .and_then(|count| count.parse().ok())
    }

    /// Deserialize the body as JSON
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Receive call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_id: String,
    pub max_messages: u32,
    pub wait_time: Duration,
    pub attribute_names: Vec<String>,
    /// Overrides the queue's visibility timeout when set
    pub visibility_timeout: Option<Duration>,
}

impl ReceiveRequest {
    /// Receive request with the reference parameters: 10 messages, 20 s
    /// long poll, all attributes
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self {
            queue_id: queue_id.into(),
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_time: DEFAULT_WAIT_TIME,
            attribute_names: vec![ALL_ATTRIBUTES.to_string()],
            visibility_timeout: None,
        }
    }

    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_visibility_timeout(mut self, visibility_timeout: Option<Duration>) -> Self {
        self.visibility_timeout = visibility_timeout;
        self
    }
}

/// Single send call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub queue_id: String,
    pub body: String,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
}

/// One entry of a batch send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageBatchEntry {
    /// Unique within the batch
    pub id: String,
    pub body: String,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
}

/// Batch send call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageBatchRequest {
    pub queue_id: String,
    pub entries: Vec<SendMessageBatchEntry>,
}

/// Status returned by delete and send calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportStatus {
    pub status_code: u16,
}

impl TransportStatus {
    pub const OK: TransportStatus = TransportStatus {
        status_code: STATUS_OK,
    };

    pub fn new(status_code: u16) -> Self {
        Self { status_code }
    }

    /// Only 200 counts as a confirmed operation
    pub fn is_ok(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queue_id: String,
    /// Messages currently visible to receivers
    pub visible_count: u64,
    /// Messages received but not yet deleted or expired
    pub in_flight_count: u64,
}

impl QueueStats {
    /// Total messages held by the queue
    pub fn total(&self) -> u64 {
        self.visible_count + self.in_flight_count
    }
}
