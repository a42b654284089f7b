//! # Queue Poller
//!
//! Long-running loop that receives from every registered queue and feeds
//! the batches to the [`Dispatcher`].
//!
//! ## Polling modes
//!
//! - [`PollingMode::Sequential`]: one task walks the queues in sorted order,
//!   one receive per queue, then waits `idle_interval` before the next pass.
//! - [`PollingMode::PerQueue`]: one task per queue runs the same
//!   receive → dispatch → idle cycle independently, so a slow queue never
//!   delays another.
//!
//! Every suspension point (receive, handler, idle wait) races the
//! [`ShutdownSignal`]; no receive starts after shutdown has been requested.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dispatcher::{BatchReport, Dispatcher};
use super::shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
use super::stats::{PollerStats, PollerStatsSnapshot};
use crate::constants::{DEFAULT_IDLE_INTERVAL, DEFAULT_WAIT_TIME};
use crate::messaging::message::ReceiveRequest;
use crate::messaging::transport::QueueTransport;
use crate::registry::HandlerRegistry;

/// How queues are scheduled onto tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingMode {
    #[default]
    Sequential,
    PerQueue,
}

/// Runtime settings for the consumer loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Pause after each full pass (or per-queue cycle)
    pub idle_interval: Duration,
    /// Long-poll wait per receive call
    pub wait_time: Duration,
    /// Overrides the queue's visibility timeout when set
    pub visibility_timeout: Option<Duration>,
    pub polling_mode: PollingMode,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            idle_interval: DEFAULT_IDLE_INTERVAL,
            wait_time: DEFAULT_WAIT_TIME,
            visibility_timeout: None,
            polling_mode: PollingMode::Sequential,
        }
    }
}

/// The consumer engine
#[derive(Clone)]
pub struct QueuePoller {
    poller_id: Uuid,
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn QueueTransport>,
    dispatcher: Dispatcher,
    config: ConsumerConfig,
    stats: Arc<PollerStats>,
}

impl std::fmt::Debug for QueuePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuePoller")
            .field("poller_id", &self.poller_id)
            .field("registry", &self.registry)
            .field("transport", &self.transport.transport_name())
            .field("config", &self.config)
            .finish()
    }
}

impl QueuePoller {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn QueueTransport>,
        config: ConsumerConfig,
    ) -> Self {
        let stats = Arc::new(PollerStats::default());
        let dispatcher = Dispatcher::new(registry.clone(), transport.clone(), stats.clone());
        let poller_id = Uuid::new_v4();

        info!(
            poller_id = %poller_id,
            transport = transport.transport_name(),
            queues = registry.len(),
            polling_mode = ?config.polling_mode,
            "Creating QueuePoller"
        );

        Self {
            poller_id,
            registry,
            transport,
            dispatcher,
            config,
            stats,
        }
    }

    pub fn poller_id(&self) -> Uuid {
        self.poller_id
    }

    pub fn stats(&self) -> &Arc<PollerStats> {
        &self.stats
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Start the loop on a background task
    pub fn spawn(self) -> PollerHandle {
        let (trigger, signal) = shutdown_channel();
        let poller_id = self.poller_id;
        let stats = self.stats.clone();
        let join_handle = tokio::spawn(async move { self.run(signal).await });

        PollerHandle {
            poller_id,
            trigger,
            join_handle,
            stats,
        }
    }

    /// Run until `shutdown` fires
    pub async fn run(&self, shutdown: ShutdownSignal) {
        self.stats.mark_started();
        info!(
            poller_id = %self.poller_id,
            queues = ?self.registry.queue_ids(),
            idle_interval_ms = self.config.idle_interval.as_millis() as u64,
            "🚀 Starting QueuePoller"
        );
        if self.registry.is_empty() {
            warn!(
                poller_id = %self.poller_id,
                "⚠️ No queue handlers registered, poller will idle until shutdown"
            );
        }

        match self.config.polling_mode {
            PollingMode::Sequential => self.run_sequential(&shutdown).await,
            PollingMode::PerQueue => self.run_per_queue(&shutdown).await,
        }

        info!(poller_id = %self.poller_id, "🛑 QueuePoller stopped");
    }

    async fn run_sequential(&self, shutdown: &ShutdownSignal) {
        while !shutdown.is_shutdown() {
            self.poll_all_once(shutdown).await;
            if !self.idle(shutdown).await {
                break;
            }
        }
    }

    async fn run_per_queue(&self, shutdown: &ShutdownSignal) {
        if self.registry.is_empty() {
            // Keep counting cycles so an idle poller still shows liveness
            self.run_sequential(shutdown).await;
            return;
        }

        let tasks: Vec<JoinHandle<()>> = self
            .registry
            .queue_ids()
            .iter()
            .cloned()
            .map(|queue_id| {
                let poller = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    while !shutdown.is_shutdown() {
                        poller.stats.polling_cycles.fetch_add(1, Ordering::Relaxed);
                        poller.stats.mark_polled();
                        poller.poll_queue_once(&queue_id, &shutdown).await;
                        if !poller.idle(&shutdown).await {
                            break;
                        }
                    }
                    debug!(queue = %queue_id, "Per-queue polling task stopped");
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                error!(
                    poller_id = %self.poller_id,
                    error = %e,
                    "❌ Per-queue polling task failed"
                );
            }
        }
    }

    /// Wait `idle_interval`; `false` when shutdown interrupted the wait
    async fn idle(&self, shutdown: &ShutdownSignal) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.idle_interval) => true,
        }
    }

    /// One pass: a receive cycle for every registered queue, in sorted order
    pub async fn poll_all_once(&self, shutdown: &ShutdownSignal) -> Vec<BatchReport> {
        let cycle_start = std::time::Instant::now();
        self.stats.polling_cycles.fetch_add(1, Ordering::Relaxed);
        self.stats.mark_polled();

        let mut reports = Vec::new();
        for queue_id in self.registry.queue_ids() {
            if shutdown.is_shutdown() {
                break;
            }
            if let Some(report) = self.poll_queue_once(queue_id, shutdown).await {
                reports.push(report);
            }
        }

        debug!(
            poller_id = %self.poller_id,
            duration_ms = cycle_start.elapsed().as_millis() as u64,
            batches = reports.len(),
            "Completed polling cycle"
        );
        reports
    }

    /// Receive once from `queue_id` and dispatch the batch.
    ///
    /// Returns `None` when nothing was dispatched: unknown queue, receive
    /// failure, empty receive, or shutdown during the receive.
    pub async fn poll_queue_once(
        &self,
        queue_id: &str,
        shutdown: &ShutdownSignal,
    ) -> Option<BatchReport> {
        let binding = self.registry.binding(queue_id)?;
        if shutdown.is_shutdown() {
            return None;
        }

        let request = ReceiveRequest::new(queue_id)
            .with_max_messages(binding.effective_max_messages())
            .with_wait_time(self.config.wait_time)
            .with_visibility_timeout(self.config.visibility_timeout);

        self.stats.receive_calls.fetch_add(1, Ordering::Relaxed);
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(queue = %queue_id, "Receive abandoned on shutdown");
                return None;
            }
            received = self.transport.receive_messages(request) => received,
        };

        let messages = match received {
            Ok(messages) => messages,
            Err(e) => {
                self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                error!(
                    poller_id = %self.poller_id,
                    queue = %queue_id,
                    error = %e,
                    "❌ Failed to receive messages"
                );
                return None;
            }
        };

        if messages.is_empty() {
            debug!(queue = %queue_id, "No messages received");
            return None;
        }

        self.stats
            .messages_received
            .fetch_add(messages.len() as u64, Ordering::Relaxed);
        debug!(
            poller_id = %self.poller_id,
            queue = %queue_id,
            count = messages.len(),
            "📨 Received messages"
        );

        Some(
            self.dispatcher
                .dispatch_batch(queue_id, messages, shutdown)
                .await,
        )
    }
}

/// Handle to a spawned [`QueuePoller`]
#[derive(Debug)]
pub struct PollerHandle {
    poller_id: Uuid,
    trigger: ShutdownTrigger,
    join_handle: JoinHandle<()>,
    stats: Arc<PollerStats>,
}

impl PollerHandle {
    pub fn poller_id(&self) -> Uuid {
        self.poller_id
    }

    pub fn stats(&self) -> PollerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Request shutdown without waiting for the loop to exit
    pub fn request_shutdown(&self) {
        self.trigger.trigger();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Request shutdown and wait for the loop to exit
    pub async fn shutdown(self) -> Result<PollerStatsSnapshot, tokio::task::JoinError> {
        info!(poller_id = %self.poller_id, "Stopping QueuePoller");
        self.trigger.trigger();
        self.join_handle.await?;
        Ok(self.stats.snapshot())
    }
}
