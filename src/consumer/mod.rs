//! # Consumer Engine
//!
//! Polls registered queues, dispatches messages to their handlers and
//! deletes the ones handled successfully.
//!
//! ```text
//! QueuePoller ──receive──▶ Dispatcher ──handle──▶ MessageHandler
//!                              │
//!                              └──Ok(true)──▶ Acknowledger ──delete──▶ transport
//! ```

pub mod acknowledger;
pub mod dispatcher;
pub mod poller;
pub mod scope;
pub mod shutdown;
pub mod stats;

pub use acknowledger::Acknowledger;
pub use dispatcher::{BatchReport, DispatchOutcome, Dispatcher, MessageOutcome};
pub use poller::{ConsumerConfig, PollerHandle, PollingMode, QueuePoller};
pub use scope::BatchScope;
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use stats::{PollerStats, PollerStatsSnapshot};
