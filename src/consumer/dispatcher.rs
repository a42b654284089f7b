//! # Dispatcher
//!
//! Hands each received message to the handler bound to its queue and acts
//! on the result:
//!
//! | handler result        | outcome              | deleted |
//! |-----------------------|----------------------|---------|
//! | `Ok(true)`            | `Acknowledged`       | yes     |
//! | `Ok(true)`, delete ✗  | `AcknowledgeFailed`  | no      |
//! | `Ok(false)`           | `LeftForRedelivery`  | no      |
//! | `Err(_)` or panic     | `HandlerError`       | no      |
//! | no handler for queue  | `HandlerNotFound`    | no      |
//! | shutdown mid-handler  | `Cancelled`          | no      |
//! | shutdown, delete hung | `AcknowledgeFailed`  | no      |
//!
//! Messages of a batch run sequentially in transport order. A failure on
//! one message never stops the next one from being dispatched.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::acknowledger::Acknowledger;
use super::scope::BatchScope;
use super::shutdown::ShutdownSignal;
use super::stats::PollerStats;
use crate::constants::ACKNOWLEDGE_GRACE_PERIOD;
use crate::messaging::message::{Message, MessageId};
use crate::messaging::transport::QueueTransport;
use crate::registry::{HandlerRegistry, MessageHandler};

/// Result of dispatching one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
    Acknowledged,
    AcknowledgeFailed,
    LeftForRedelivery,
    HandlerError,
    HandlerNotFound,
    Cancelled,
}

impl DispatchOutcome {
    /// The handler reported success, whether or not the delete was confirmed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::AcknowledgeFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledged => "acknowledged",
            Self::AcknowledgeFailed => "acknowledge_failed",
            Self::LeftForRedelivery => "left_for_redelivery",
            Self::HandlerError => "handler_error",
            Self::HandlerNotFound => "handler_not_found",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    pub message_id: MessageId,
    pub outcome: DispatchOutcome,
}

/// Summary of one receive batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub queue_id: String,
    pub batch_id: Uuid,
    pub outcomes: Vec<MessageOutcome>,
    /// Messages never handed to the handler because shutdown arrived first
    pub not_dispatched: usize,
}

impl BatchReport {
    pub fn count(&self, outcome: DispatchOutcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    pub fn acknowledged(&self) -> usize {
        self.count(DispatchOutcome::Acknowledged)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len() + self.not_dispatched
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes messages to handlers and acknowledges successes
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    acknowledger: Acknowledger,
    stats: Arc<PollerStats>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("acknowledger", &self.acknowledger)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn QueueTransport>,
        stats: Arc<PollerStats>,
    ) -> Self {
        Self {
            registry,
            acknowledger: Acknowledger::new(transport),
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<PollerStats> {
        &self.stats
    }

    /// Dispatch every message of one receive batch under a fresh scope
    pub async fn dispatch_batch(
        &self,
        queue_id: &str,
        messages: Vec<Message>,
        shutdown: &ShutdownSignal,
    ) -> BatchReport {
        let scope = BatchScope::new(queue_id, messages.len());
        let total = messages.len();
        let mut outcomes = Vec::with_capacity(total);

        debug!(
            queue = %queue_id,
            batch_id = %scope.batch_id(),
            batch_size = total,
            "📦 Dispatching batch"
        );

        for message in &messages {
            if shutdown.is_shutdown() {
                break;
            }
            let outcome = self.dispatch_with_shutdown(&scope, message, shutdown).await;
            outcomes.push(MessageOutcome {
                message_id: message.message_id.clone(),
                outcome,
            });
        }

        let not_dispatched = total - outcomes.len();
        if not_dispatched > 0 {
            info!(
                queue = %queue_id,
                batch_id = %scope.batch_id(),
                not_dispatched = not_dispatched,
                "🛑 Shutdown requested, remaining messages left for redelivery"
            );
        }

        BatchReport {
            queue_id: queue_id.to_string(),
            batch_id: scope.batch_id(),
            outcomes,
            not_dispatched,
        }
    }

    /// Dispatch one message; the handler is abandoned if shutdown fires first.
    ///
    /// A delete that has already started is allowed to finish.
    pub async fn dispatch_with_shutdown(
        &self,
        scope: &BatchScope,
        message: &Message,
        shutdown: &ShutdownSignal,
    ) -> DispatchOutcome {
        let outcome = self.dispatch_inner(scope, message, Some(shutdown)).await;
        self.stats.record_outcome(outcome);
        outcome
    }

    /// Dispatch one message without observing shutdown
    pub async fn dispatch(&self, scope: &BatchScope, message: &Message) -> DispatchOutcome {
        let outcome = self.dispatch_inner(scope, message, None).await;
        self.stats.record_outcome(outcome);
        outcome
    }

    async fn dispatch_inner(
        &self,
        scope: &BatchScope,
        message: &Message,
        shutdown: Option<&ShutdownSignal>,
    ) -> DispatchOutcome {
        let queue_id = scope.queue_id();
        let Some(handler) = self.registry.resolve(queue_id) else {
            warn!(
                queue = %queue_id,
                message_id = %message.message_id,
                "⚠️ No handler registered for queue, skipping message"
            );
            return DispatchOutcome::HandlerNotFound;
        };

        let result = match shutdown {
            Some(shutdown) => tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    warn!(
                        queue = %queue_id,
                        message_id = %message.message_id,
                        "🛑 Handler abandoned on shutdown, message left for redelivery"
                    );
                    return DispatchOutcome::Cancelled;
                }
                result = invoke_handler(handler.as_ref(), scope, message) => result,
            },
            None => invoke_handler(handler.as_ref(), scope, message).await,
        };

        match result {
            Ok(true) => {
                if self.acknowledge(scope, message, shutdown).await {
                    info!(
                        queue = %queue_id,
                        message_id = %message.message_id,
                        batch_id = %scope.batch_id(),
                        "✅ Message processed"
                    );
                    DispatchOutcome::Acknowledged
                } else {
                    DispatchOutcome::AcknowledgeFailed
                }
            }
            Ok(false) => {
                info!(
                    queue = %queue_id,
                    message_id = %message.message_id,
                    batch_id = %scope.batch_id(),
                    "↩️ Handler declined message, left for redelivery"
                );
                DispatchOutcome::LeftForRedelivery
            }
            Err(e) => {
                error!(
                    queue = %queue_id,
                    message_id = %message.message_id,
                    batch_id = %scope.batch_id(),
                    handler_type = handler.handler_name(),
                    error = %e,
                    "❌ Error processing message"
                );
                DispatchOutcome::HandlerError
            }
        }
    }
}

impl Dispatcher {
    /// Delete a handled message.
    ///
    /// Once shutdown fires, a delete already in flight gets
    /// [`ACKNOWLEDGE_GRACE_PERIOD`] to finish; after that it is abandoned and
    /// the message reappears once its visibility timeout expires.
    async fn acknowledge(
        &self,
        scope: &BatchScope,
        message: &Message,
        shutdown: Option<&ShutdownSignal>,
    ) -> bool {
        let delete = self
            .acknowledger
            .acknowledge(scope.queue_id(), &message.receipt_handle);
        tokio::pin!(delete);

        let Some(shutdown) = shutdown else {
            return delete.await;
        };

        tokio::select! {
            biased;
            confirmed = &mut delete => confirmed,
            _ = shutdown.cancelled() => {
                match tokio::time::timeout(ACKNOWLEDGE_GRACE_PERIOD, &mut delete).await {
                    Ok(confirmed) => confirmed,
                    Err(_) => {
                        warn!(
                            queue = %scope.queue_id(),
                            message_id = %message.message_id,
                            grace_period_ms = ACKNOWLEDGE_GRACE_PERIOD.as_millis() as u64,
                            "🛑 Delete abandoned on shutdown, message will be redelivered"
                        );
                        false
                    }
                }
            }
        }
    }
}

/// Run the handler, turning a panic into an error
async fn invoke_handler(
    handler: &dyn MessageHandler,
    scope: &BatchScope,
    message: &Message,
) -> anyhow::Result<bool> {
    match AssertUnwindSafe(handler.handle(scope, message))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
