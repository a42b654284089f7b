//! Recording transport with failure injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use queue_dispatch::messaging::{
    InMemoryTransport, Message, QueueStats, QueueTransport, ReceiptHandle, ReceiveRequest,
    SendMessageBatchRequest, SendMessageRequest, TransportError, TransportResult,
    TransportStatus,
};

/// Wraps [`InMemoryTransport`], recording every call
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub inner: InMemoryTransport,
    receives: Mutex<Vec<ReceiveRequest>>,
    deletes: Mutex<Vec<(String, ReceiptHandle)>>,
    sends: Mutex<Vec<SendMessageRequest>>,
    batch_sends: Mutex<Vec<SendMessageBatchRequest>>,
    failing_receive_queues: Mutex<HashSet<String>>,
    delete_status_override: Mutex<Option<u16>>,
    send_status_override: Mutex<Option<u16>>,
    fail_deletes: AtomicBool,
    hang_deletes: AtomicBool,
}

impl RecordingTransport {
    pub fn with_queues(queue_ids: &[&str]) -> Self {
        Self {
            inner: InMemoryTransport::with_queues(queue_ids),
            ..Self::default()
        }
    }

    pub fn fail_receives_for(&self, queue_id: &str) {
        self.failing_receive_queues.lock().insert(queue_id.to_string());
    }

    pub fn set_delete_status(&self, status_code: u16) {
        *self.delete_status_override.lock() = Some(status_code);
    }

    pub fn set_send_status(&self, status_code: u16) {
        *self.send_status_override.lock() = Some(status_code);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Deletes are recorded and then never resolve
    pub fn hang_deletes(&self) {
        self.hang_deletes.store(true, Ordering::SeqCst);
    }

    pub fn receive_requests(&self) -> Vec<ReceiveRequest> {
        self.receives.lock().clone()
    }

    pub fn receive_count(&self) -> usize {
        self.receives.lock().len()
    }

    pub fn receive_count_for(&self, queue_id: &str) -> usize {
        self.receives
            .lock()
            .iter()
            .filter(|r| r.queue_id == queue_id)
            .count()
    }

    pub fn delete_calls(&self) -> Vec<(String, ReceiptHandle)> {
        self.deletes.lock().clone()
    }

    pub fn sent_requests(&self) -> Vec<SendMessageRequest> {
        self.sends.lock().clone()
    }

    pub fn batch_requests(&self) -> Vec<SendMessageBatchRequest> {
        self.batch_sends.lock().clone()
    }

    /// Send a plain message straight to the inner transport
    pub async fn seed(&self, queue_id: &str, bodies: &[&str]) {
        for body in bodies {
            self.inner
                .send_message(SendMessageRequest {
                    queue_id: queue_id.to_string(),
                    body: body.to_string(),
                    group_id: None,
                    deduplication_id: None,
                })
                .await
                .expect("seed message");
        }
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    async fn receive_messages(&self, request: ReceiveRequest) -> TransportResult<Vec<Message>> {
        self.receives.lock().push(request.clone());
        if self.failing_receive_queues.lock().contains(&request.queue_id) {
            return Err(TransportError::connection("injected receive failure"));
        }
        self.inner.receive_messages(request).await
    }

    async fn delete_message(
        &self,
        queue_id: &str,
        receipt_handle: &ReceiptHandle,
    ) -> TransportResult<TransportStatus> {
        self.deletes
            .lock()
            .push((queue_id.to_string(), receipt_handle.clone()));
        if self.hang_deletes.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(TransportError::queue_operation(
                queue_id,
                "delete",
                "injected delete failure",
            ));
        }
        let override_status = *self.delete_status_override.lock();
        match override_status {
            // The transport answered, but did not delete anything
            Some(status_code) => Ok(TransportStatus::new(status_code)),
            None => self.inner.delete_message(queue_id, receipt_handle).await,
        }
    }

    async fn send_message(&self, request: SendMessageRequest) -> TransportResult<TransportStatus> {
        self.sends.lock().push(request.clone());
        let override_status = *self.send_status_override.lock();
        match override_status {
            Some(status_code) => Ok(TransportStatus::new(status_code)),
            None => self.inner.send_message(request).await,
        }
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> TransportResult<TransportStatus> {
        self.batch_sends.lock().push(request.clone());
        let override_status = *self.send_status_override.lock();
        match override_status {
            Some(status_code) => Ok(TransportStatus::new(status_code)),
            None => self.inner.send_message_batch(request).await,
        }
    }

    async fn queue_stats(&self, queue_id: &str) -> TransportResult<QueueStats> {
        self.inner.queue_stats(queue_id).await
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}
