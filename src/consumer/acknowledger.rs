//! # Acknowledger
//!
//! Deletes successfully handled messages from their source queue.
//!
//! Only a 200 status from the transport confirms the delete. Anything else
//! is logged and reported as `false`; the message then reappears after its
//! visibility timeout. Deletes are never retried within the same poll.

use std::sync::Arc;

use tracing::{info, warn};

use crate::messaging::message::ReceiptHandle;
use crate::messaging::transport::QueueTransport;

#[derive(Clone)]
pub struct Acknowledger {
    transport: Arc<dyn QueueTransport>,
}

impl std::fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acknowledger")
            .field("transport", &self.transport.transport_name())
            .finish()
    }
}

impl Acknowledger {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Delete a message by receipt handle; `true` only on a confirmed delete
    pub async fn acknowledge(&self, queue_id: &str, receipt_handle: &ReceiptHandle) -> bool {
        match self.transport.delete_message(queue_id, receipt_handle).await {
            Ok(status) if status.is_ok() => {
                info!(
                    queue = %queue_id,
                    receipt_handle = %receipt_handle,
                    "🗑️ Message deleted"
                );
                true
            }
            Ok(status) => {
                warn!(
                    queue = %queue_id,
                    receipt_handle = %receipt_handle,
                    status_code = status.status_code,
                    "⚠️ Delete not confirmed, message will be redelivered"
                );
                false
            }
            Err(e) => {
                warn!(
                    queue = %queue_id,
                    receipt_handle = %receipt_handle,
                    error = %e,
                    "⚠️ Delete failed, message will be redelivered"
                );
                false
            }
        }
    }
}
