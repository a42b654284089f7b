//! # Structured Logging Module
//!
//! Environment-aware tracing setup. Development and test runs get a human
//! readable console layer; production (or `QUEUE_DISPATCH_LOG_FORMAT=json`)
//! gets one JSON object per line.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; an already installed global subscriber is
/// kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let format_override = std::env::var("QUEUE_DISPATCH_LOG_FORMAT").ok();
        let format = get_log_format(&environment, format_override.as_deref());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = match format {
            LogFormat::Console => fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .boxed(),
        };

        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            format = ?format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Current environment name
fn get_environment() -> String {
    std::env::var("QUEUE_DISPATCH_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default filter directive for an environment, used when `RUST_LOG` is unset
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Output format for an environment; an explicit override wins
fn get_log_format(environment: &str, override_format: Option<&str>) -> LogFormat {
    match override_format {
        Some("json") => LogFormat::Json,
        Some("console") => LogFormat::Console,
        _ if environment == "production" => LogFormat::Json,
        _ => LogFormat::Console,
    }
}

/// Log structured data for a queue operation
pub fn log_queue_operation(
    operation: &str,
    queue_id: &str,
    status: &str,
    message_count: Option<usize>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        queue = %queue_id,
        status = %status,
        message_count = message_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📬 QUEUE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
