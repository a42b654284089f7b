//! # Messaging Module
//!
//! Queue transport abstraction, message types and the producer.
//!
//! The consumer engine and producer talk to queues only through
//! [`QueueTransport`]. [`InMemoryTransport`] backs tests and local runs;
//! `PgmqTransport` (feature `pgmq`) stores messages in PostgreSQL.

pub mod errors;
pub mod in_memory;
pub mod message;
#[cfg(feature = "pgmq")]
pub mod pgmq_transport;
pub mod producer;
pub mod transport;

pub use errors::{ProducerError, TransportError, TransportResult};
pub use in_memory::InMemoryTransport;
pub use message::*;
#[cfg(feature = "pgmq")]
pub use pgmq_transport::PgmqTransport;
pub use producer::QueueProducer;
pub use transport::QueueTransport;
