#![allow(dead_code)]

pub mod handlers;
pub mod strategies;
pub mod transport;

pub use handlers::*;
pub use transport::*;

use std::time::Duration;

use queue_dispatch::consumer::{ConsumerConfig, PollingMode};

/// Consumer settings with short waits so tests run quickly
pub fn fast_consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        idle_interval: Duration::from_millis(10),
        wait_time: Duration::from_millis(20),
        visibility_timeout: None,
        polling_mode: PollingMode::Sequential,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
