#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, FIFO in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Queue Dispatch
//!
//! Queue consumer/producer framework: bind handlers to queues, poll them in
//! the background, dispatch each message to its handler and delete only the
//! messages the handler reports as processed.
//!
//! ## Architecture
//!
//! ```text
//! QueueBinding ─▶ HandlerRegistry ─▶ QueuePoller ─▶ Dispatcher ─▶ Acknowledger
//!                                        │                             │
//!                                        └──── QueueTransport ◀────────┘
//!                                                   ▲
//!                                   QueueProducer ──┘
//! ```
//!
//! ## Delivery contract
//!
//! - A handler returns `anyhow::Result<bool>`. Only `Ok(true)` deletes the
//!   message; `Ok(false)`, `Err(_)` and panics leave it for redelivery after
//!   the visibility timeout.
//! - A failing message never stops the rest of its batch.
//! - Delivery is at-least-once; handlers should be idempotent.
//!
//! ## Module Organization
//!
//! - [`registry`] - Queue bindings, handler trait and the immutable registry
//! - [`consumer`] - Polling loop, dispatcher, acknowledger, batch scope, shutdown
//! - [`messaging`] - Transport trait, in-memory and pgmq transports, producer
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use queue_dispatch::consumer::{BatchScope, ConsumerConfig, QueuePoller};
//! use queue_dispatch::messaging::{InMemoryTransport, Message, QueueProducer};
//! use queue_dispatch::registry::{HandlerRegistry, QueueBinding};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(InMemoryTransport::with_queues(&["orders"]));
//!
//! let registry = HandlerRegistry::builder()
//!     .register_fn(QueueBinding::new("orders"), |_scope: BatchScope, message: Message| async move {
//!         println!("processing {}", message.body);
//!         Ok(true)
//!     })
//!     .build()?;
//!
//! let producer = QueueProducer::new(transport.clone());
//! producer.send_message("orders", "hello", None, None).await?;
//!
//! let handle = QueuePoller::new(Arc::new(registry), transport, ConsumerConfig::default()).spawn();
//! // ... later
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod registry;

pub use config::{ConfigurationError, DispatchConfig};
pub use consumer::{
    BatchScope, ConsumerConfig, DispatchOutcome, PollerHandle, PollingMode, QueuePoller,
    ShutdownSignal,
};
pub use error::{QueueDispatchError, Result};
pub use messaging::{
    InMemoryTransport, Message, ProducerError, QueueProducer, QueueTransport, TransportError,
};
pub use registry::{HandlerModule, HandlerRegistry, MessageHandler, QueueBinding, RegistryError};
