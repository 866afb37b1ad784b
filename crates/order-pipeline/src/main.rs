//! # Order Pipeline
//!
//! Provisions the pipeline in-process, submits a set of demo orders, waits for them to
//! settle and reports what happened to each.
//!
//! ```bash
//! # Ten orders, every fourth one invalid (ends up in the dead-letter queue)
//! OP_VISIBILITY_TIMEOUT_SECS=2 order-pipeline --orders 10 --poison-every 4
//!
//! # Same, then remove the rule, subscriptions and queued messages
//! order-pipeline --orders 10 --cleanup --notification-email ops@example.com
//! ```
//!
//! Exits with 0 on success and 1 when configuration, provisioning or settling fails.

use actor_runtime::tracing::setup_tracing;
use clap::Parser;
use order_pipeline::config::PipelineConfig;
use order_pipeline::lifecycle::{PipelineError, PipelineSystem};
use order_pipeline::model::{Order, OrderItem};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Order pipeline demo runner
#[derive(Parser, Debug)]
#[command(name = "order-pipeline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Region label reported in logs
    #[arg(long, env = "OP_REGION")]
    region: Option<String>,

    /// Tear down the rule, subscriptions and queued messages before exiting
    #[arg(long)]
    cleanup: bool,

    /// Subscribe this address to order notifications (pending until confirmed)
    #[arg(long, env = "OP_NOTIFICATION_EMAIL")]
    notification_email: Option<String>,

    /// Number of demo orders to submit
    #[arg(long, default_value_t = 5)]
    orders: usize,

    /// Make every Nth order invalid so it exhausts its retries
    #[arg(long)]
    poison_every: Option<usize>,
}

fn demo_order(n: usize, poison: bool) -> Order {
    let items = if poison {
        Vec::new()
    } else {
        vec![OrderItem {
            product_id: format!("PROD-{}", n % 3 + 1),
            quantity: (n % 4 + 1) as u32,
            price: 29.99,
        }]
    };
    let total = items.iter().map(|i| i.price * f64::from(i.quantity)).sum::<f64>();
    Order::new(
        &format!("ORD-{n:03}"),
        &format!("CUST-{}", 100 + n % 7),
        items,
        if poison { 10.0 } else { total },
    )
}

/// Long enough for a poison message to use up every receive and reach the dead-letter queue.
fn settle_timeout(config: &PipelineConfig) -> Duration {
    let attempts = config
        .ingestion
        .redrive_policy
        .as_ref()
        .map_or(1, |p| p.max_receive_count + 1);
    config.ingestion.visibility_timeout * attempts
        + config.consumer.max_batching_window
        + Duration::from_secs(10)
}

async fn run(args: Args, config: PipelineConfig) -> Result<(), PipelineError> {
    let system = PipelineSystem::start(config).await?;

    let span = tracing::info_span!("submit_orders", count = args.orders);
    async {
        for n in 1..=args.orders {
            let poison = args.poison_every.is_some_and(|every| every > 0 && n % every == 0);
            let order = demo_order(n, poison);
            let message_id = system.submit(&order).await?;
            info!(order_id = %order.order_id, %message_id, poison, "Order submitted");
        }
        Ok::<_, PipelineError>(())
    }
    .instrument(span)
    .await?;

    let timeout = settle_timeout(&system.config);
    info!(?timeout, "Waiting for the pipeline to settle");
    system.settle(timeout).await?;

    let report = system.report().await?;
    info!(
        received = report.processor.received,
        succeeded = report.processor.succeeded,
        failed = report.processor.failed,
        duplicates = report.processor.duplicates,
        "Processor summary"
    );
    for dead in &report.dead_letters {
        warn!(
            message_id = %dead.message.id,
            receive_count = dead.message.receive_count,
            reason = %dead.info.failure_reason,
            "Dead-lettered"
        );
    }
    for target in &report.targets {
        info!(
            target_id = %target.target,
            destination = %target.destination,
            delivered = target.delivered,
            exhausted = target.exhausted,
            "Router target"
        );
    }
    for subscription in &report.subscriptions {
        info!(
            endpoint = %subscription.endpoint,
            status = ?subscription.status(),
            delivered = subscription.delivered,
            "Subscription"
        );
    }
    info!(
        audit_entries = report.audit_entries,
        dead_letters = report.dead_letters.len(),
        alarm = %report.alarm,
        "Pipeline summary"
    );

    if args.cleanup {
        system.teardown().await?;
    }
    system.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment and defaults still apply
    dotenvy::dotenv().ok();
    setup_tracing();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env_or_default();
    if let Some(region) = &args.region {
        config.region = region.clone();
    }
    if args.notification_email.is_some() {
        config.notification_email = args.notification_email.clone();
    }

    info!(region = %config.region, orders = args.orders, "Starting order pipeline");
    match run(args, config).await {
        Ok(()) => {
            info!("Application completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Order pipeline failed");
            ExitCode::FAILURE
        }
    }
}
