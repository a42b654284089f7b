//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::errors::{ProducerError, TransportError};
use crate::registry::RegistryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueDispatchError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, QueueDispatchError>;
