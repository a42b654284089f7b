//! # Configuration
//!
//! Layered settings for the consumer, producer and transport, loaded with
//! the `config` crate in this order (later wins):
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables prefixed `QUEUE_DISPATCH__`, with `__`
//!    between nesting levels, e.g. `QUEUE_DISPATCH__CONSUMER__IDLE_INTERVAL_MS=250`
//!
//! ```toml
//! [consumer]
//! idle_interval_ms = 1000
//! wait_time_seconds = 20
//! polling_mode = "per_queue"
//!
//! [producer]
//! batch_size = 10
//!
//! [transport]
//! kind = "in_memory"
//! queues = ["orders", "orders.fifo"]
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::constants::{MAX_WAIT_TIME, TRANSPORT_BATCH_LIMIT};
use crate::consumer::{ConsumerConfig, PollingMode};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "QUEUE_DISPATCH";

/// Separator between prefix and nesting levels in environment keys
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        Self::load(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Consumer loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub idle_interval_ms: u64,
    pub wait_time_seconds: u64,
    pub visibility_timeout_seconds: Option<u64>,
    pub polling_mode: PollingMode,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            idle_interval_ms: 1000,
            wait_time_seconds: 20,
            visibility_timeout_seconds: None,
            polling_mode: PollingMode::Sequential,
        }
    }
}

/// Producer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// Entries per transport batch call
    pub batch_size: u32,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            batch_size: TRANSPORT_BATCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    InMemory,
    Pgmq,
}

/// Transport selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub kind: TransportKind,
    /// Required for `pgmq`
    pub database_url: Option<String>,
    /// Queues created at startup
    pub queues: Vec<String>,
    pub default_visibility_timeout_seconds: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::InMemory,
            database_url: None,
            queues: Vec::new(),
            default_visibility_timeout_seconds: 30,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub consumer: ConsumerSettings,
    pub producer: ProducerSettings,
    pub transport: TransportSettings,
}

impl DispatchConfig {
    /// Defaults overlaid with environment variables
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(None)
    }

    /// Defaults, then `path` if given and present, then environment variables
    pub fn load_from(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let loaded: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("transport.queues")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse TOML text over the defaults without consulting the environment
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let loaded: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.consumer.wait_time_seconds > MAX_WAIT_TIME.as_secs() {
            return Err(ConfigurationError::invalid_value(
                "consumer.wait_time_seconds",
                format!("must be at most {}", MAX_WAIT_TIME.as_secs()),
            ));
        }
        if self.producer.batch_size == 0 || self.producer.batch_size > TRANSPORT_BATCH_LIMIT {
            return Err(ConfigurationError::invalid_value(
                "producer.batch_size",
                format!("must be between 1 and {TRANSPORT_BATCH_LIMIT}"),
            ));
        }
        if self.transport.kind == TransportKind::Pgmq
            && self
                .transport
                .database_url
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err(ConfigurationError::invalid_value(
                "transport.database_url",
                "required for the pgmq transport",
            ));
        }
        if self.transport.queues.iter().any(|queue| queue.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "transport.queues",
                "queue identifiers cannot be empty",
            ));
        }
        Ok(())
    }

    /// Runtime consumer settings
    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            idle_interval: Duration::from_millis(self.consumer.idle_interval_ms),
            wait_time: Duration::from_secs(self.consumer.wait_time_seconds),
            visibility_timeout: self.consumer.visibility_timeout_seconds.map(Duration::from_secs),
            polling_mode: self.consumer.polling_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());

        let consumer = config.consumer_config();
        assert_eq!(consumer, ConsumerConfig::default());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = DispatchConfig::from_toml_str(
            r#"
            [consumer]
            idle_interval_ms = 250
            polling_mode = "per_queue"
            visibility_timeout_seconds = 45

            [transport]
            queues = ["orders", "orders.fifo"]
            "#,
        )
        .unwrap();

        assert_eq!(config.consumer.idle_interval_ms, 250);
        assert_eq!(config.consumer.wait_time_seconds, 20);
        assert_eq!(config.consumer.polling_mode, PollingMode::PerQueue);
        assert_eq!(config.transport.queues, vec!["orders", "orders.fifo"]);

        let consumer = config.consumer_config();
        assert_eq!(consumer.visibility_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_validation_rejects_long_wait() {
        let err =
            DispatchConfig::from_toml_str("[consumer]\nwait_time_seconds = 21\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref field, .. } if field == "consumer.wait_time_seconds"
        ));
    }

    #[test]
    fn test_validation_rejects_batch_size() {
        let err = DispatchConfig::from_toml_str("[producer]\nbatch_size = 11\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));

        let err = DispatchConfig::from_toml_str("[producer]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_pgmq_requires_database_url() {
        let err = DispatchConfig::from_toml_str("[transport]\nkind = \"pgmq\"\n").unwrap_err();
        assert!(err.to_string().contains("transport.database_url"));
    }
}
