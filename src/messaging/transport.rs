//! # Queue Transport Trait
//!
//! The seam between the dispatch engine and a concrete queue backend.

use async_trait::async_trait;

use super::errors::TransportResult;
use super::message::{
    Message, QueueStats, ReceiptHandle, ReceiveRequest, SendMessageBatchRequest,
    SendMessageRequest, TransportStatus,
};

/// Provider-agnostic queue operations
///
/// Implementations must be safe to share across tasks: the consumer and
/// producer hold one `Arc<dyn QueueTransport>` and call it without extra
/// locking. A transport is expected to support:
///
/// - Receive with long polling and visibility timeout
/// - Delete by receipt handle (idempotent from the caller's view)
/// - Single and batch sends, with group/dedup ids for FIFO queues
#[async_trait]
pub trait QueueTransport: Send + Sync + 'static {
    /// Receive up to `request.max_messages` messages, waiting at most
    /// `request.wait_time` for the first one to arrive.
    ///
    /// An empty vector means the long poll expired without messages.
    async fn receive_messages(&self, request: ReceiveRequest) -> TransportResult<Vec<Message>>;

    /// Delete a received message. Deleting an already-deleted message must
    /// not fail.
    async fn delete_message(
        &self,
        queue_id: &str,
        receipt_handle: &ReceiptHandle,
    ) -> TransportResult<TransportStatus>;

    /// Send one message
    async fn send_message(&self, request: SendMessageRequest) -> TransportResult<TransportStatus>;

    /// Send a batch of messages in one call. Callers keep batches within the
    /// transport batch limit.
    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> TransportResult<TransportStatus>;

    /// Queue statistics for monitoring
    async fn queue_stats(&self, queue_id: &str) -> TransportResult<QueueStats>;

    /// Transport name for logging
    fn transport_name(&self) -> &'static str;
}
