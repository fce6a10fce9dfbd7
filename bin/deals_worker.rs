//! # Deals Worker
//!
//! Process entrypoint for the ingestion side: runs the five-stage deal
//! pipeline (ingest, normalize, score, tag, persist & emit) on a fixed
//! interval, mining CSV datasets and the operational booking database
//! and publishing the resulting top deals to `deal.events`.
//!
//! ```bash
//! cargo run --bin deals-worker
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use anyhow::Result;
use clap::Parser;
use concierge_svc::bus::DealEventProducer;
use concierge_svc::config::Settings;
use concierge_svc::db;
use concierge_svc::ingestion::IngestionPipeline;
use concierge_svc::topics::{self, TopicManifest};
use tokio::signal;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(name = "deals-worker", about = "Deal ingestion pipeline worker")]
struct Cli {
    /// Run a single ingestion tick then exit, instead of looping forever.
    #[arg(long)]
    once: bool,
    /// Directory holding the CSV datasets mined by this worker.
    #[arg(long, default_value = "/app/data/raw")]
    data_dir: String,
    /// Optional path to a topic manifest YAML; skipped if unset.
    #[arg(long)]
    topics_manifest: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::new()?;
    log::info!("starting deals-worker {} ({})", settings.version, settings.environment);

    #[cfg(feature = "observability")]
    {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;
        concierge_svc::metrics::describe_metrics();
    }

    let db_pool = db::connect(&settings.database_url, settings.db_max_connections).await?;
    let producer = DealEventProducer::new(&settings.kafka_bootstrap_servers, settings.kafka_deal_topic.clone())?;

    if let Some(manifest_path) = &cli.topics_manifest {
        match std::fs::read_to_string(manifest_path) {
            Ok(yaml) => match TopicManifest::from_yaml(&yaml) {
                Ok(manifest) => {
                    if let Err(e) = topics::bootstrap_topics(&settings.kafka_bootstrap_servers, &manifest).await {
                        log::warn!("topic bootstrap failed, continuing without it: {}", e);
                    }
                }
                Err(e) => log::warn!("failed to parse topic manifest {}: {}", manifest_path, e),
            },
            Err(e) => log::warn!("failed to read topic manifest {}: {}", manifest_path, e),
        }
    }

    let pipeline = IngestionPipeline::new(db_pool, producer, cli.data_dir);

    if cli.once {
        let processed = pipeline.run_tick().await?;
        log::info!("single ingestion tick complete, processed {} deals", processed);
        return Ok(());
    }

    let mut ticker = interval(Duration::from_secs(settings.ingestion_interval_seconds));
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("shutdown requested, stopping ingestion worker");
                return Ok(());
            }
            _ = ticker.tick() => {
                match pipeline.run_tick().await {
                    Ok(processed) => log::info!("ingestion tick processed {} deals", processed),
                    Err(e) => log::warn!("ingestion tick failed, will retry next interval: {}", e),
                }
            }
        }
    }
}
