// ==============================================================================
// main.rs - Arrays Metrics Entry Point
// ==============================================================================
// Description: Collects arrays variant calling metrics for one VCF
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-15
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arrays_metrics::config::{Args, RunConfig};
use arrays_metrics::processor::ArraysMetricsProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arrays_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let run_id = uuid::Uuid::new_v4();
    info!("Arrays metrics starting (run {})", run_id);

    // Validate before touching any file
    let config = RunConfig::from_args(args).context("Invalid configuration")?;
    info!(
        "Workers: {}, call rate threshold: {}",
        config.worker_count, config.params.call_rate_pf_threshold
    );

    // CPU-bound work stays off the async executor
    let processor = ArraysMetricsProcessor::new(run_id, config);
    let outcome = tokio::task::spawn_blocking(move || processor.process())
        .await
        .context("Metrics task panicked")?;

    match outcome {
        Ok(outcome) => {
            for path in &outcome.reports {
                info!("Wrote {:?}", path);
            }
            info!(
                "Processing completed successfully: {} samples",
                outcome.metrics.samples.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("Processing failed: {:#}", e);
            Err(e)
        }
    }
}
