use std::sync::Arc;

use anyhow::{Context, Result};
use storefront_telemetry::export::{DataType, ExportFormat};
use storefront_telemetry::network::{HttpPipeline, HttpRequest, ReqwestTransport};
use storefront_telemetry::platform::{Document, InMemoryTimeline};
use storefront_telemetry::services::report::HttpReporter;
use storefront_telemetry::{Aggregator, Collectors, TelemetryConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Telemetry pipeline booting...");

    // Usage: storefront-telemetry [config.json] [warmup-url]
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => TelemetryConfig::from_path(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => TelemetryConfig::default(),
    };
    let warmup_url = args.next();

    // Composition root: every hub and collector is built once here.
    let session_id = Uuid::new_v4().to_string();
    let pipeline = Arc::new(HttpPipeline::new(Arc::new(ReqwestTransport::default())));
    let timeline = Arc::new(InMemoryTimeline::new());
    let document = Arc::new(Document::new());
    let reporter = Arc::new(HttpReporter::new());

    let collectors = Collectors::from_config(
        &config,
        pipeline.clone(),
        timeline,
        document,
        reporter,
        &session_id,
    )
    .context("building collectors")?;
    let aggregator = Arc::new(
        Aggregator::new(
            config.aggregator.clone(),
            config.performance.thresholds.clone(),
            collectors,
        )
        .context("building aggregator")?,
    );
    aggregator.start();
    tracing::info!(session = %session_id, "Telemetry pipeline active. Press Ctrl+C to stop.");

    if let Some(url) = warmup_url {
        let errors = aggregator.collectors().errors.clone();
        let client = pipeline.clone();
        errors.spawn_monitored(async move {
            let response = client.execute(HttpRequest::get(url.clone())).await?;
            tracing::info!(url = %url, status = response.status, "warmup request finished");
            Ok::<_, storefront_telemetry::error::TransportError>(())
        });
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("Shutting down...");

    aggregator.capture();
    let export = aggregator
        .export(
            &[DataType::Snapshots, DataType::Network, DataType::Errors],
            ExportFormat::Json,
        )
        .context("exporting telemetry")?;
    aggregator.shutdown();

    tokio::fs::write(&export.filename, &export.content)
        .await
        .with_context(|| format!("writing {}", export.filename))?;
    tracing::info!(file = %export.filename, "telemetry exported");

    Ok(())
}
