//! # PostgreSQL Message Queue Transport (pgmq-rs)
//!
//! Durable transport backed by the pgmq Postgres extension. Enabled with the
//! `pgmq` feature.
//!
//! Each message is stored as a JSON envelope carrying the body and the FIFO
//! ids supplied at send time. pgmq has no notion of message groups, so group
//! ordering is not enforced by this transport; the group id is still
//! reported back as the `MessageGroupId` attribute.

use std::time::Duration;

use async_trait::async_trait;
use pgmq::{types::Message as PgmqMessage, PGMQueue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::errors::{TransportError, TransportResult};
use super::message::{
    Message, QueueStats, ReceiptHandle, ReceiveRequest, SendMessageBatchRequest,
    SendMessageRequest, TransportStatus,
};
use super::transport::QueueTransport;
use crate::constants::{attributes, TRANSPORT_BATCH_LIMIT};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: i32 = 30;

/// Stored form of a message inside a pgmq queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgmqEnvelope {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplication_id: Option<String>,
}

/// pgmq-rs based queue transport
#[derive(Debug, Clone)]
pub struct PgmqTransport {
    pgmq: PGMQueue,
}

impl PgmqTransport {
    /// Connect using a database URL
    pub async fn new(database_url: &str) -> TransportResult<Self> {
        info!("🚀 Connecting to pgmq using pgmq-rs crate");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| TransportError::connection(e.to_string()))?;

        info!("✅ Connected to pgmq using pgmq-rs");
        Ok(Self { pgmq })
    }

    /// Reuse an existing connection pool
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        Self {
            pgmq: PGMQueue::new_with_pool(pool).await,
        }
    }

    /// Create a queue if it doesn't exist
    pub async fn create_queue(&self, queue_id: &str) -> TransportResult<()> {
        let queue_name = pgmq_queue_name(queue_id);
        self.pgmq
            .create(&queue_name)
            .await
            .map_err(|e| TransportError::queue_operation(queue_id, "create", e.to_string()))?;
        info!(queue = %queue_name, "✅ Queue created");
        Ok(())
    }

    fn to_message(queue_id: &str, raw: PgmqMessage<PgmqEnvelope>) -> Message {
        let envelope = raw.message;
        let mut message = Message::new(raw.msg_id, raw.msg_id, envelope.body)
            .with_attribute(attributes::APPROXIMATE_RECEIVE_COUNT, raw.read_ct.to_string())
            .with_attribute(
                attributes::SENT_TIMESTAMP,
                raw.enqueued_at.timestamp_millis().to_string(),
            );
        if let Some(group_id) = envelope.group_id {
            message = message.with_attribute(attributes::MESSAGE_GROUP_ID, group_id);
        }
        if let Some(dedup) = envelope.deduplication_id {
            message = message.with_attribute(attributes::MESSAGE_DEDUPLICATION_ID, dedup);
        }
        debug!(queue = %queue_id, msg_id = raw.msg_id, "📨 Converted pgmq message");
        message
    }
}

/// Map a queue identifier onto a valid pgmq queue name.
///
/// URL-style identifiers keep only their last path segment, and characters
/// pgmq rejects become underscores.
pub fn pgmq_queue_name(queue_id: &str) -> String {
    let last_segment = queue_id.rsplit('/').next().unwrap_or(queue_id);
    last_segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[async_trait]
impl QueueTransport for PgmqTransport {
    async fn receive_messages(&self, request: ReceiveRequest) -> TransportResult<Vec<Message>> {
        let queue_name = pgmq_queue_name(&request.queue_id);
        let max = request.max_messages.min(TRANSPORT_BATCH_LIMIT) as i32;
        let vt = request
            .visibility_timeout
            .map(|vt| vt.as_secs() as i32)
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECONDS);

        let raw = self
            .pgmq
            .read_batch_with_poll::<PgmqEnvelope>(
                &queue_name,
                Some(vt),
                max,
                Some(request.wait_time),
                Some(POLL_INTERVAL),
            )
            .await
            .map_err(|e| {
                TransportError::queue_operation(&request.queue_id, "receive", e.to_string())
            })?
            .unwrap_or_default();

        Ok(raw
            .into_iter()
            .map(|m| Self::to_message(&request.queue_id, m))
            .collect())
    }

    async fn delete_message(
        &self,
        queue_id: &str,
        receipt_handle: &ReceiptHandle,
    ) -> TransportResult<TransportStatus> {
        let msg_id = receipt_handle.as_i64().ok_or_else(|| {
            TransportError::invalid_request(
                queue_id,
                format!("receipt handle {receipt_handle} is not a pgmq message id"),
            )
        })?;

        // Deleting an already-deleted id affects no rows and still succeeds
        self.pgmq
            .delete(&pgmq_queue_name(queue_id), msg_id)
            .await
            .map_err(|e| TransportError::queue_operation(queue_id, "delete", e.to_string()))?;
        Ok(TransportStatus::OK)
    }

    async fn send_message(&self, request: SendMessageRequest) -> TransportResult<TransportStatus> {
        let envelope = PgmqEnvelope {
            body: request.body,
            group_id: request.group_id,
            deduplication_id: request.deduplication_id,
        };
        self.pgmq
            .send(&pgmq_queue_name(&request.queue_id), &envelope)
            .await
            .map_err(|e| {
                TransportError::queue_operation(&request.queue_id, "send", e.to_string())
            })?;
        Ok(TransportStatus::OK)
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> TransportResult<TransportStatus> {
        if request.entries.is_empty() {
            return Err(TransportError::invalid_request(
                &request.queue_id,
                "batch must contain at least one entry",
            ));
        }
        let envelopes: Vec<PgmqEnvelope> = request
            .entries
            .into_iter()
            .map(|entry| PgmqEnvelope {
                body: entry.body,
                group_id: entry.group_id,
                deduplication_id: entry.deduplication_id,
            })
            .collect();

        self.pgmq
            .send_batch(&pgmq_queue_name(&request.queue_id), &envelopes)
            .await
            .map_err(|e| {
                TransportError::queue_operation(&request.queue_id, "send_batch", e.to_string())
            })?;
        Ok(TransportStatus::OK)
    }

    async fn queue_stats(&self, queue_id: &str) -> TransportResult<QueueStats> {
        let queue_name = pgmq_queue_name(queue_id);
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT queue_length FROM pgmq.metrics($1)")
                .bind(&queue_name)
                .fetch_optional(&self.pgmq.connection)
                .await
                .map_err(|e| TransportError::queue_operation(queue_id, "stats", e.to_string()))?;

        Ok(QueueStats {
            queue_id: queue_id.to_string(),
            visible_count: row.and_then(|(len,)| len).unwrap_or(0).max(0) as u64,
            in_flight_count: 0,
        })
    }

    fn transport_name(&self) -> &'static str {
        "pgmq"
    }
}
