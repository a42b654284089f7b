//! Runtime statistics for the queue poller.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::dispatcher::DispatchOutcome;

/// Counters updated by the poller and dispatcher
#[derive(Debug, Default)]
pub struct PollerStats {
    /// Full passes over the registered queues
    pub polling_cycles: AtomicU64,
    pub receive_calls: AtomicU64,
    pub receive_errors: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_acknowledged: AtomicU64,
    /// Handler succeeded but the delete was not confirmed
    pub acknowledge_failures: AtomicU64,
    /// Handler returned `false`
    pub messages_left_for_redelivery: AtomicU64,
    /// Handler returned an error or panicked
    pub handler_errors: AtomicU64,
    pub handler_not_found: AtomicU64,
    /// Handler invocations abandoned because of shutdown
    pub handlers_cancelled: AtomicU64,
    pub last_poll_at: Mutex<Option<DateTime<Utc>>>,
    pub started_at: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`PollerStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollerStatsSnapshot {
    pub polling_cycles: u64,
    pub receive_calls: u64,
    pub receive_errors: u64,
    pub messages_received: u64,
    pub messages_acknowledged: u64,
    pub acknowledge_failures: u64,
    pub messages_left_for_redelivery: u64,
    pub handler_errors: u64,
    pub handler_not_found: u64,
    pub handlers_cancelled: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl PollerStats {
    pub fn record_outcome(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Acknowledged => &self.messages_acknowledged,
            DispatchOutcome::AcknowledgeFailed => &self.acknowledge_failures,
            DispatchOutcome::LeftForRedelivery => &self.messages_left_for_redelivery,
            DispatchOutcome::HandlerError => &self.handler_errors,
            DispatchOutcome::HandlerNotFound => &self.handler_not_found,
            DispatchOutcome::Cancelled => &self.handlers_cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.lock() = Some(Utc::now());
    }

    pub(crate) fn mark_polled(&self) {
        *self.last_poll_at.lock() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> PollerStatsSnapshot {
        PollerStatsSnapshot {
            polling_cycles: self.polling_cycles.load(Ordering::Relaxed),
            receive_calls: self.receive_calls.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_acknowledged: self.messages_acknowledged.load(Ordering::Relaxed),
            acknowledge_failures: self.acknowledge_failures.load(Ordering::Relaxed),
            messages_left_for_redelivery: self.messages_left_for_redelivery.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            handler_not_found: self.handler_not_found.load(Ordering::Relaxed),
            handlers_cancelled: self.handlers_cancelled.load(Ordering::Relaxed),
            last_poll_at: *self.last_poll_at.lock(),
            started_at: *self.started_at.lock(),
        }
    }
}
