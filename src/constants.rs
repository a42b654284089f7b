//! # Dispatch Constants
//!
//! Operational boundaries of the consumer and producer. These mirror the
//! limits of SQS-style transports: at most 10 messages per receive or batch
//! send, and at most 20 seconds of long polling.

use std::time::Duration;

/// Default maximum messages requested per receive call
pub const DEFAULT_MAX_MESSAGES: u32 = 10;

/// Hard transport limit on messages per receive call and per batch send
pub const TRANSPORT_BATCH_LIMIT: u32 = 10;

/// Default long-poll wait for a receive call
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);

/// Longest long-poll wait a transport accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

/// Default pause between two full passes over all registered queues
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Time an in-flight delete may still take after shutdown is requested
pub const ACKNOWLEDGE_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Attribute selector that requests every message attribute
pub const ALL_ATTRIBUTES: &str = "All";

/// Name suffix that marks an ordered (FIFO) queue
pub const FIFO_QUEUE_SUFFIX: &str = ".fifo";

/// Status code a transport returns for a confirmed operation
pub const STATUS_OK: u16 = 200;

/// Well-known system attribute names attached to received messages
pub mod attributes {
    pub const MESSAGE_GROUP_ID: &str = "MessageGroupId";
    pub const MESSAGE_DEDUPLICATION_ID: &str = "MessageDeduplicationId";
    pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";
    pub const SENT_TIMESTAMP: &str = "SentTimestamp";
}

/// Returns true when the queue identifier names an ordered (FIFO) queue.
///
/// The suffix comparison is ASCII case-insensitive, so `orders.FIFO` and
/// `https://host/123/orders.fifo` are both ordered queues.
pub fn is_fifo_queue(queue_id: &str) -> bool {
    let suffix_len = FIFO_QUEUE_SUFFIX.len();
    queue_id.len() >= suffix_len
        && queue_id.is_char_boundary(queue_id.len() - suffix_len)
        && queue_id[queue_id.len() - suffix_len..].eq_ignore_ascii_case(FIFO_QUEUE_SUFFIX)
}
