//! # In-Memory Queue Transport
//!
//! Thread-safe in-memory queue implementation for testing and development.
//!
//! ## Features
//!
//! - **Visibility Timeout**: messages become invisible after receive and
//!   visible again once the timeout expires without a delete
//! - **Long Polling**: receive waits up to `wait_time` for a message to arrive
//! - **FIFO Queues**: queues named `*.fifo` require a group id, never hand out
//!   a group while one of its messages is in flight, and drop duplicate sends
//!   inside the deduplication window
//! - **Idempotent Delete**: unknown or stale receipt handles are a no-op

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::errors::{TransportError, TransportResult};
use super::message::{
    Message, MessageId, QueueStats, ReceiptHandle, ReceiveRequest, SendMessageBatchRequest,
    SendMessageRequest, TransportStatus,
};
use super::transport::QueueTransport;
use crate::constants::{attributes, is_fifo_queue, ALL_ATTRIBUTES, TRANSPORT_BATCH_LIMIT};

/// Default visibility timeout for queues created without an explicit one
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Window in which a repeated deduplication id is discarded
pub const DEFAULT_DEDUPLICATION_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: u64,
    body: String,
    group_id: Option<String>,
    deduplication_id: Option<String>,
    sent_at: DateTime<Utc>,
    /// None until first received
    invisible_until: Option<Instant>,
    receipt_handle: Option<String>,
    receive_count: u32,
}

impl StoredMessage {
    fn is_in_flight(&self, now: Instant) -> bool {
        self.invisible_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug)]
struct InMemoryQueue {
    fifo: bool,
    visibility_timeout: Duration,
    messages: VecDeque<StoredMessage>,
    next_id: u64,
    /// deduplication id -> time it was first accepted
    recent_deduplication_ids: HashMap<String, Instant>,
}

impl InMemoryQueue {
    fn new(queue_id: &str, visibility_timeout: Duration) -> Self {
        Self {
            fifo: is_fifo_queue(queue_id),
            visibility_timeout,
            messages: VecDeque::new(),
            next_id: 1,
            recent_deduplication_ids: HashMap::new(),
        }
    }
}

/// Counters describing how the transport has been used
#[derive(Debug, Default)]
pub struct InMemoryTransportCounters {
    pub receive_calls: AtomicU64,
    pub delete_calls: AtomicU64,
    pub send_calls: AtomicU64,
    pub batch_send_calls: AtomicU64,
}

/// In-memory queue transport
///
/// # Example
///
/// ```rust
/// use queue_dispatch::messaging::{InMemoryTransport, QueueTransport, ReceiveRequest, SendMessageRequest};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = InMemoryTransport::new();
/// transport.create_queue("orders");
///
/// transport
///     .send_message(SendMessageRequest {
///         queue_id: "orders".to_string(),
///         body: "hello".to_string(),
///         group_id: None,
///         deduplication_id: None,
///     })
///     .await?;
///
/// let messages = transport
///     .receive_messages(ReceiveRequest::new("orders").with_wait_time(Duration::ZERO))
///     .await?;
/// assert_eq!(messages.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryTransport {
    queues: DashMap<String, InMemoryQueue>,
    message_arrived: Notify,
    default_visibility_timeout: Duration,
    deduplication_window: Duration,
    counters: InMemoryTransportCounters,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// Create a transport with no queues
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    /// Create a transport whose queues default to the given visibility timeout
    pub fn with_visibility_timeout(default_visibility_timeout: Duration) -> Self {
        Self {
            queues: DashMap::new(),
            message_arrived: Notify::new(),
            default_visibility_timeout,
            deduplication_window: DEFAULT_DEDUPLICATION_WINDOW,
            counters: InMemoryTransportCounters::default(),
        }
    }

    /// Create a transport with pre-created queues
    pub fn with_queues(queue_ids: &[&str]) -> Self {
        let transport = Self::new();
        for queue_id in queue_ids {
            transport.create_queue(queue_id);
        }
        transport
    }

    /// Create a queue if it doesn't exist (idempotent)
    pub fn create_queue(&self, queue_id: &str) {
        self.create_queue_with_visibility_timeout(queue_id, self.default_visibility_timeout);
    }

    /// Create a queue with its own visibility timeout (idempotent)
    pub fn create_queue_with_visibility_timeout(
        &self,
        queue_id: &str,
        visibility_timeout: Duration,
    ) {
        self.queues
            .entry(queue_id.to_string())
            .or_insert_with(|| InMemoryQueue::new(queue_id, visibility_timeout));
    }

    /// Remove a queue and all its messages
    pub fn delete_queue(&self, queue_id: &str) -> bool {
        self.queues.remove(queue_id).is_some()
    }

    /// Number of messages held by a queue, visible or in flight
    pub fn queue_length(&self, queue_id: &str) -> usize {
        self.queues
            .get(queue_id)
            .map(|queue| queue.messages.len())
            .unwrap_or(0)
    }

    /// Bodies of all messages held by a queue, in queue order
    pub fn message_bodies(&self, queue_id: &str) -> Vec<String> {
        self.queues
            .get(queue_id)
            .map(|queue| queue.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Usage counters
    pub fn counters(&self) -> &InMemoryTransportCounters {
        &self.counters
    }

    /// Number of receive calls issued so far
    pub fn receive_calls(&self) -> u64 {
        self.counters.receive_calls.load(Ordering::Relaxed)
    }

    /// Number of delete calls issued so far
    pub fn delete_calls(&self) -> u64 {
        self.counters.delete_calls.load(Ordering::Relaxed)
    }

    fn enqueue(
        &self,
        queue_id: &str,
        body: &str,
        group_id: Option<&str>,
        deduplication_id: Option<&str>,
    ) -> TransportResult<()> {
        let mut queue = self
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| TransportError::queue_not_found(queue_id))?;

        let (group_id, deduplication_id) = if queue.fifo {
            let group_id = group_id.filter(|g| !g.is_empty()).ok_or_else(|| {
                TransportError::invalid_request(queue_id, "MessageGroupId is required")
            })?;
            let deduplication_id = deduplication_id.filter(|d| !d.is_empty()).ok_or_else(|| {
                TransportError::invalid_request(queue_id, "MessageDeduplicationId is required")
            })?;
            (Some(group_id.to_string()), Some(deduplication_id.to_string()))
        } else {
            (None, None)
        };

        if let Some(dedup) = &deduplication_id {
            let now = Instant::now();
            let window = self.deduplication_window;
            queue
                .recent_deduplication_ids
                .retain(|_, accepted_at| now.duration_since(*accepted_at) < window);
            if queue.recent_deduplication_ids.contains_key(dedup) {
                debug!(queue = %queue_id, deduplication_id = %dedup, "Duplicate send discarded");
                return Ok(());
            }
            queue.recent_deduplication_ids.insert(dedup.clone(), now);
        }

        let message_id = queue.next_id;
        queue.next_id += 1;
        queue.messages.push_back(StoredMessage {
            message_id,
            body: body.to_string(),
            group_id,
            deduplication_id,
            sent_at: Utc::now(),
            invisible_until: None,
            receipt_handle: None,
            receive_count: 0,
        });
        Ok(())
    }

    /// Claim visible messages, or report the next instant a message becomes
    /// visible again
    fn claim_visible(
        &self,
        request: &ReceiveRequest,
    ) -> TransportResult<(Vec<Message>, Option<Instant>)> {
        let mut queue = self
            .queues
            .get_mut(&request.queue_id)
            .ok_or_else(|| TransportError::queue_not_found(&request.queue_id))?;

        let now = Instant::now();
        let visibility_timeout = request
            .visibility_timeout
            .unwrap_or(queue.visibility_timeout);
        let limit = request.max_messages.min(TRANSPORT_BATCH_LIMIT) as usize;

        let blocked_groups: HashSet<String> = if queue.fifo {
            queue
                .messages
                .iter()
                .filter(|m| m.is_in_flight(now))
                .filter_map(|m| m.group_id.clone())
                .collect()
        } else {
            HashSet::new()
        };

        let mut claimed = Vec::new();
        let mut next_visible: Option<Instant> = None;

        for stored in queue.messages.iter_mut() {
            if stored.is_in_flight(now) {
                next_visible = match (next_visible, stored.invisible_until) {
                    (Some(current), Some(until)) => Some(current.min(until)),
                    (None, until) => until,
                    (current, None) => current,
                };
                continue;
            }
            if claimed.len() >= limit {
                continue;
            }
            if let Some(group) = &stored.group_id {
                if blocked_groups.contains(group) {
                    continue;
                }
            }

            let receipt_handle = Uuid::new_v4().to_string();
            stored.invisible_until = Some(now + visibility_timeout);
            stored.receipt_handle = Some(receipt_handle.clone());
            stored.receive_count += 1;
            claimed.push(Self::to_message(stored, receipt_handle, &request.attribute_names));
        }

        Ok((claimed, next_visible))
    }

    fn to_message(
        stored: &StoredMessage,
        receipt_handle: String,
        attribute_names: &[String],
    ) -> Message {
        let wants = |name: &str| {
            attribute_names
                .iter()
                .any(|requested| requested == ALL_ATTRIBUTES || requested == name)
        };

        let mut message = Message::new(
            MessageId::from(stored.message_id.to_string()),
            ReceiptHandle::from(receipt_handle),
            stored.body.clone(),
        );
        if wants(attributes::APPROXIMATE_RECEIVE_COUNT) {
            message = message.with_attribute(
                attributes::APPROXIMATE_RECEIVE_COUNT,
                stored.receive_count.to_string(),
            );
        }
        if wants(attributes::SENT_TIMESTAMP) {
            message = message.with_attribute(
                attributes::SENT_TIMESTAMP,
                stored.sent_at.timestamp_millis().to_string(),
            );
        }
        if let (Some(group), true) = (&stored.group_id, wants(attributes::MESSAGE_GROUP_ID)) {
            message = message.with_attribute(attributes::MESSAGE_GROUP_ID, group.clone());
        }
        if let (Some(dedup), true) = (
            &stored.deduplication_id,
            wants(attributes::MESSAGE_DEDUPLICATION_ID),
        ) {
            message = message.with_attribute(attributes::MESSAGE_DEDUPLICATION_ID, dedup.clone());
        }
        message
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn receive_messages(&self, request: ReceiveRequest) -> TransportResult<Vec<Message>> {
        self.counters.receive_calls.fetch_add(1, Ordering::Relaxed);
        if request.max_messages == 0 {
            return Err(TransportError::invalid_request(
                &request.queue_id,
                "max_messages must be at least 1",
            ));
        }

        let deadline = Instant::now() + request.wait_time;
        loop {
            // Register interest before checking so a send between the check
            // and the wait still wakes us.
            let notified = self.message_arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (claimed, next_visible) = self.claim_visible(&request)?;
            if !claimed.is_empty() || Instant::now() >= deadline {
                debug!(
                    queue = %request.queue_id,
                    count = claimed.len(),
                    "📨 In-memory receive completed"
                );
                return Ok(claimed);
            }

            let wake_at = next_visible.map_or(deadline, |visible| visible.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete_message(
        &self,
        queue_id: &str,
        receipt_handle: &ReceiptHandle,
    ) -> TransportResult<TransportStatus> {
        self.counters.delete_calls.fetch_add(1, Ordering::Relaxed);
        let mut queue = self
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| TransportError::queue_not_found(queue_id))?;

        let position = queue
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle.as_str()));
        if let Some(position) = position {
            queue.messages.remove(position);
        }
        drop(queue);

        // A delete can unblock a FIFO group
        self.message_arrived.notify_waiters();
        Ok(TransportStatus::OK)
    }

    async fn send_message(&self, request: SendMessageRequest) -> TransportResult<TransportStatus> {
        self.counters.send_calls.fetch_add(1, Ordering::Relaxed);
        self.enqueue(
            &request.queue_id,
            &request.body,
            request.group_id.as_deref(),
            request.deduplication_id.as_deref(),
        )?;
        self.message_arrived.notify_waiters();
        Ok(TransportStatus::OK)
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> TransportResult<TransportStatus> {
        self.counters.batch_send_calls.fetch_add(1, Ordering::Relaxed);
        if request.entries.is_empty() {
            return Err(TransportError::invalid_request(
                &request.queue_id,
                "batch must contain at least one entry",
            ));
        }
        if request.entries.len() > TRANSPORT_BATCH_LIMIT as usize {
            return Err(TransportError::invalid_request(
                &request.queue_id,
                format!(
                    "batch of {} entries exceeds limit of {}",
                    request.entries.len(),
                    TRANSPORT_BATCH_LIMIT
                ),
            ));
        }
        let unique_ids: HashSet<&str> = request.entries.iter().map(|e| e.id.as_str()).collect();
        if unique_ids.len() != request.entries.len() {
            return Err(TransportError::invalid_request(
                &request.queue_id,
                "batch entry ids must be unique",
            ));
        }

        for entry in &request.entries {
            self.enqueue(
                &request.queue_id,
                &entry.body,
                entry.group_id.as_deref(),
                entry.deduplication_id.as_deref(),
            )?;
        }
        self.message_arrived.notify_waiters();
        Ok(TransportStatus::OK)
    }

    async fn queue_stats(&self, queue_id: &str) -> TransportResult<QueueStats> {
        let queue = self
            .queues
            .get(queue_id)
            .ok_or_else(|| TransportError::queue_not_found(queue_id))?;

        let now = Instant::now();
        let in_flight_count = queue.messages.iter().filter(|m| m.is_in_flight(now)).count() as u64;
        Ok(QueueStats {
            queue_id: queue_id.to_string(),
            visible_count: queue.messages.len() as u64 - in_flight_count,
            in_flight_count,
        })
    }

    fn transport_name(&self) -> &'static str {
        "in_memory"
    }
}
