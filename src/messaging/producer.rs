//! # Queue Producer
//!
//! Send surface for single and batched messages. Ordered (`.fifo`) queues
//! require a group id from the caller and receive a generated deduplication
//! id when none is supplied; standard queues never carry either.
//!
//! Caller mistakes are rejected up front with [`ProducerError`]. Transport
//! failures are logged and reported as `Ok(false)`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::ProducerError;
use super::message::{SendMessageBatchEntry, SendMessageBatchRequest, SendMessageRequest};
use super::transport::QueueTransport;
use crate::constants::{is_fifo_queue, TRANSPORT_BATCH_LIMIT};

/// Producer for sending messages through a [`QueueTransport`]
#[derive(Clone)]
pub struct QueueProducer {
    transport: Arc<dyn QueueTransport>,
    batch_size: usize,
}

impl std::fmt::Debug for QueueProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProducer")
            .field("transport", &self.transport.transport_name())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl QueueProducer {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            transport,
            batch_size: TRANSPORT_BATCH_LIMIT as usize,
        }
    }

    /// Entries per transport batch call, clamped to the transport limit
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.clamp(1, TRANSPORT_BATCH_LIMIT) as usize;
        self
    }

    /// Send one message.
    ///
    /// Returns `Ok(true)` when the transport confirmed the send with a 200
    /// status, `Ok(false)` when the transport failed or answered otherwise.
    pub async fn send_message(
        &self,
        queue_id: &str,
        body: impl Into<String>,
        group_id: Option<&str>,
        deduplication_id: Option<&str>,
    ) -> Result<bool, ProducerError> {
        let request = build_send_request(queue_id, body.into(), group_id, deduplication_id)?;

        debug!(
            queue = %queue_id,
            group_id = ?request.group_id,
            "📤 Sending message"
        );

        match self.transport.send_message(request).await {
            Ok(status) if status.is_ok() => {
                info!(queue = %queue_id, "✅ Message sent");
                Ok(true)
            }
            Ok(status) => {
                warn!(
                    queue = %queue_id,
                    status_code = status.status_code,
                    "⚠️ Send not confirmed by transport"
                );
                Ok(false)
            }
            Err(e) => {
                error!(queue = %queue_id, error = %e, "❌ Failed to send message");
                Ok(false)
            }
        }
    }

    /// Send several messages, split into transport-sized batches.
    ///
    /// Every entry of an ordered queue shares `group_id` and gets its own
    /// generated deduplication id. Returns `Ok(true)` only when every batch
    /// was confirmed; sending stops at the first unconfirmed batch.
    pub async fn send_message_batch<S: AsRef<str>>(
        &self,
        queue_id: &str,
        bodies: &[S],
        group_id: Option<&str>,
    ) -> Result<bool, ProducerError> {
        let requests = chunk_batch_requests(queue_id, bodies, group_id, self.batch_size)?;
        let batch_count = requests.len();

        for (batch_index, request) in requests.into_iter().enumerate() {
            let entry_count = request.entries.len();
            match self.transport.send_message_batch(request).await {
                Ok(status) if status.is_ok() => {
                    debug!(
                        queue = %queue_id,
                        batch_index = batch_index,
                        entries = entry_count,
                        "📤 Batch sent"
                    );
                }
                Ok(status) => {
                    warn!(
                        queue = %queue_id,
                        batch_index = batch_index,
                        status_code = status.status_code,
                        "⚠️ Batch send not confirmed by transport"
                    );
                    return Ok(false);
                }
                Err(e) => {
                    error!(
                        queue = %queue_id,
                        batch_index = batch_index,
                        error = %e,
                        "❌ Failed to send message batch"
                    );
                    return Ok(false);
                }
            }
        }

        info!(
            queue = %queue_id,
            messages = bodies.len(),
            batches = batch_count,
            "✅ Message batch sent"
        );
        Ok(true)
    }
}

fn require_group_id<'a>(
    queue_id: &str,
    group_id: Option<&'a str>,
) -> Result<&'a str, ProducerError> {
    group_id
        .filter(|group| !group.is_empty())
        .ok_or_else(|| ProducerError::missing_group_id(queue_id))
}

/// Build the transport request for a single send, applying FIFO rules
pub fn build_send_request(
    queue_id: &str,
    body: String,
    group_id: Option<&str>,
    deduplication_id: Option<&str>,
) -> Result<SendMessageRequest, ProducerError> {
    if queue_id.is_empty() {
        return Err(ProducerError::EmptyQueueId);
    }

    let (group_id, deduplication_id) = if is_fifo_queue(queue_id) {
        let group = require_group_id(queue_id, group_id)?;
        let dedup = deduplication_id
            .filter(|dedup| !dedup.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        (Some(group.to_string()), Some(dedup))
    } else {
        (None, None)
    };

    Ok(SendMessageRequest {
        queue_id: queue_id.to_string(),
        body,
        group_id,
        deduplication_id,
    })
}

/// Build the transport batch requests for a batch send.
///
/// Entry ids are the index of the body in `bodies`, so they stay unique
/// across chunks.
pub fn build_batch_requests<S: AsRef<str>>(
    queue_id: &str,
    bodies: &[S],
    group_id: Option<&str>,
) -> Result<Vec<SendMessageBatchRequest>, ProducerError> {
    chunk_batch_requests(queue_id, bodies, group_id, TRANSPORT_BATCH_LIMIT as usize)
}

fn chunk_batch_requests<S: AsRef<str>>(
    queue_id: &str,
    bodies: &[S],
    group_id: Option<&str>,
    chunk_size: usize,
) -> Result<Vec<SendMessageBatchRequest>, ProducerError> {
    if queue_id.is_empty() {
        return Err(ProducerError::EmptyQueueId);
    }
    if bodies.is_empty() {
        return Err(ProducerError::empty_batch(queue_id));
    }

    let fifo_group = if is_fifo_queue(queue_id) {
        Some(require_group_id(queue_id, group_id)?)
    } else {
        None
    };

    let entries: Vec<SendMessageBatchEntry> = bodies
        .iter()
        .enumerate()
        .map(|(index, body)| SendMessageBatchEntry {
            id: index.to_string(),
            body: body.as_ref().to_string(),
            group_id: fifo_group.map(str::to_string),
            deduplication_id: fifo_group.map(|_| Uuid::new_v4().to_string()),
        })
        .collect();

    Ok(entries
        .chunks(chunk_size.max(1))
        .map(|chunk| SendMessageBatchRequest {
            queue_id: queue_id.to_string(),
            entries: chunk.to_vec(),
        })
        .collect())
}
