//! # Queue Dispatch Demo
//!
//! Runs a consumer against a few sample queues and feeds it messages through
//! the producer. Stops on Ctrl-C or after `--run-for-ms`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

use queue_dispatch::config::TransportKind;
use queue_dispatch::consumer::{BatchScope, PollingMode, QueuePoller};
use queue_dispatch::logging::{init_structured_logging, log_error, log_queue_operation};
use queue_dispatch::messaging::{InMemoryTransport, Message, QueueProducer, QueueTransport};
use queue_dispatch::registry::{
    HandlerModule, HandlerRegistry, MessageHandler, QueueBinding, RegistryBuilder,
};
use queue_dispatch::{ConfigurationError, DispatchConfig};

const ORDERS_QUEUE: &str = "orders";
const LEDGER_QUEUE: &str = "ledger.fifo";
const AUDIT_QUEUE: &str = "audit";

#[derive(Parser)]
#[command(name = "queue-dispatch-demo")]
#[command(about = "Run a queue consumer against sample queues")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Messages to produce per sample queue
    #[arg(short, long, default_value_t = 5)]
    messages: usize,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for_ms: Option<u64>,

    /// Override the configured polling mode
    #[arg(long, value_parser = parse_polling_mode)]
    polling_mode: Option<PollingMode>,
}

fn parse_polling_mode(value: &str) -> Result<PollingMode, String> {
    match value {
        "sequential" => Ok(PollingMode::Sequential),
        "per_queue" | "per-queue" => Ok(PollingMode::PerQueue),
        other => Err(format!("unknown polling mode '{other}'")),
    }
}

#[derive(Debug, Deserialize)]
struct OrderPlaced {
    order_id: u64,
    amount_cents: i64,
}

/// Accepts well-formed orders, rejects the rest
struct OrderHandler;

#[async_trait]
impl MessageHandler for OrderHandler {
    async fn handle(&self, scope: &BatchScope, message: &Message) -> anyhow::Result<bool> {
        let order: OrderPlaced = message
            .json_body()
            .with_context(|| format!("malformed order message {}", message.message_id))?;

        let batch_total = scope.get_or_insert_with(|| AtomicU64::new(0));
        batch_total.fetch_add(order.amount_cents.max(0) as u64, Ordering::Relaxed);

        info!(
            order_id = order.order_id,
            amount_cents = order.amount_cents,
            batch_id = %scope.batch_id(),
            batch_total_cents = batch_total.load(Ordering::Relaxed),
            "🛒 Order accepted"
        );
        Ok(order.amount_cents > 0)
    }
}

/// Applies ledger entries in group order
struct LedgerHandler;

#[async_trait]
impl MessageHandler for LedgerHandler {
    async fn handle(&self, _scope: &BatchScope, message: &Message) -> anyhow::Result<bool> {
        info!(
            group_id = message.group_id().unwrap_or("-"),
            body = %message.body,
            "📒 Ledger entry applied"
        );
        Ok(true)
    }
}

struct SampleHandlers;

impl HandlerModule for SampleHandlers {
    fn register_handlers(&self, builder: RegistryBuilder) -> RegistryBuilder {
        builder
            .register(QueueBinding::new(ORDERS_QUEUE), OrderHandler)
            .register(QueueBinding::new(LEDGER_QUEUE).with_max_messages(5), LedgerHandler)
            .register_fn(QueueBinding::new(AUDIT_QUEUE), |_scope, message: Message| async move {
                if message.body.contains("panic") {
                    panic!("audit handler refused {}", message.message_id);
                }
                Ok(!message.body.contains("reject"))
            })
    }
}

async fn build_transport(
    config: &DispatchConfig,
) -> queue_dispatch::Result<Arc<dyn QueueTransport>> {
    let mut queues = config.transport.queues.clone();
    for queue in [ORDERS_QUEUE, LEDGER_QUEUE, AUDIT_QUEUE] {
        if !queues.iter().any(|q| q == queue) {
            queues.push(queue.to_string());
        }
    }

    match config.transport.kind {
        TransportKind::InMemory => {
            let transport = InMemoryTransport::with_visibility_timeout(Duration::from_secs(
                config.transport.default_visibility_timeout_seconds,
            ));
            for queue in &queues {
                transport.create_queue(queue);
            }
            Ok(Arc::new(transport))
        }
        #[cfg(feature = "pgmq")]
        TransportKind::Pgmq => {
            let url = config.transport.database_url.as_deref().ok_or_else(|| {
                ConfigurationError::invalid_value(
                    "transport.database_url",
                    "required for the pgmq transport",
                )
            })?;
            let transport = queue_dispatch::messaging::PgmqTransport::new(url).await?;
            for queue in &queues {
                transport.create_queue(queue).await?;
            }
            Ok(Arc::new(transport))
        }
        #[cfg(not(feature = "pgmq"))]
        TransportKind::Pgmq => Err(ConfigurationError::invalid_value(
            "transport.kind",
            "pgmq requires building with the `pgmq` feature",
        )
        .into()),
    }
}

async fn produce_samples(producer: &QueueProducer, count: usize) -> queue_dispatch::Result<()> {
    for i in 0..count {
        // Every fourth order has no amount and is declined by the handler
        let amount_cents: i64 = if i % 4 == 3 { 0 } else { 1_000 + i as i64 };
        let body = serde_json::json!({
            "order_id": i,
            "amount_cents": amount_cents,
        });
        producer
            .send_message(ORDERS_QUEUE, body.to_string(), None, None)
            .await?;
    }
    producer
        .send_message(ORDERS_QUEUE, "not json", None, None)
        .await?;

    let ledger: Vec<String> = (0..count).map(|i| format!("entry-{i}")).collect();
    let sent = producer
        .send_message_batch(LEDGER_QUEUE, &ledger, Some("account-42"))
        .await?;
    log_queue_operation(
        "send_batch",
        LEDGER_QUEUE,
        if sent { "ok" } else { "failed" },
        Some(ledger.len()),
        None,
    );

    let audit = ["login", "reject: stale token", "panic: corrupted", "logout"];
    producer.send_message_batch(AUDIT_QUEUE, &audit, None).await?;

    // Caller error, surfaced rather than swallowed
    if let Err(e) = producer.send_message(LEDGER_QUEUE, "no group", None, None).await {
        log_error("demo", "send_message", &e.to_string(), Some(LEDGER_QUEUE));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let mut config = DispatchConfig::load_from(cli.config.as_deref())
        .context("failed to load demo configuration")?;
    if let Some(mode) = cli.polling_mode {
        config.consumer.polling_mode = mode;
    }
    info!(config = ?config, "🔧 Configuration loaded");

    let transport = build_transport(&config).await?;
    let registry = HandlerRegistry::builder().module(&SampleHandlers).build()?;

    let producer =
        QueueProducer::new(transport.clone()).with_batch_size(config.producer.batch_size);
    produce_samples(&producer, cli.messages).await?;

    let handle =
        QueuePoller::new(Arc::new(registry), transport.clone(), config.consumer_config()).spawn();

    match cli.run_for_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => {
            info!("Press Ctrl-C to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C, stopping now");
            }
        }
    }

    let stats = handle.shutdown().await?;
    info!(stats = ?stats, "📊 Poller statistics");

    for queue in [ORDERS_QUEUE, LEDGER_QUEUE, AUDIT_QUEUE] {
        let queue_stats = transport.queue_stats(queue).await?;
        log_queue_operation(
            "remaining",
            queue,
            "ok",
            Some(queue_stats.total() as usize),
            None,
        );
    }
    Ok(())
}
