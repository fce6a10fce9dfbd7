//! # Concierge Service
//!
//! Process entrypoint for the concierge-facing side: wires the
//! `AppContext`, subscribes to `deal.events`, and runs the watch
//! evaluator loop in the background. HTTP/WebSocket transport is out of
//! scope — this binary exists to prove the wiring compiles and runs;
//! an external router mounts `concierge_svc::api`'s handlers.
//!
//! ```bash
//! cargo run --bin concierge
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use anyhow::Result;
use clap::Parser;
use concierge_svc::bus::DealEventConsumer;
use concierge_svc::config::Settings;
use concierge_svc::context::AppContext;
use concierge_svc::watch_evaluator::WatchEvaluator;
use tokio::signal;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "concierge", about = "Travel concierge bundle/deal service")]
struct Cli {
    /// Run one watch-evaluator tick then exit, instead of looping forever.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::new()?;
    log::info!(
        "starting concierge-svc {} ({})",
        settings.version,
        settings.environment
    );

    #[cfg(feature = "observability")]
    {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;
        concierge_svc::metrics::describe_metrics();
    }

    let ctx = AppContext::bootstrap(settings.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = DealEventConsumer::new(
        ctx.deal_cache.clone(),
        settings.kafka_bootstrap_servers.clone(),
        settings.kafka_deal_topic.clone(),
        settings.kafka_group_id.clone(),
    );
    let consumer_handle = consumer.start(shutdown_rx.clone()).await;

    let evaluator = WatchEvaluator::new(
        ctx.deal_cache.clone(),
        ctx.registry.clone(),
        settings.watch_poll_interval_seconds,
    );

    if cli.once {
        evaluator.tick().await?;
        log::info!("single tick complete, exiting");
        return Ok(());
    }

    let evaluator_rx = shutdown_rx.clone();
    let evaluator_handle = tokio::spawn(async move { evaluator.run(evaluator_rx).await });

    signal::ctrl_c().await?;
    log::info!("shutdown requested, stopping background loops");
    shutdown_tx.send(true).ok();

    evaluator_handle.await.ok();
    if let Some(handle) = consumer_handle {
        handle.await.ok();
    }

    Ok(())
}
