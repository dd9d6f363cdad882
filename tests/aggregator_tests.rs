mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, settle, Harness, MockReporter, ScriptedTransport};
use storefront_telemetry::config::{AggregatorConfig, TelemetryConfig};
use storefront_telemetry::error::ConfigError;
use storefront_telemetry::export::{DataType, ExportBundle, ExportFormat};
use storefront_telemetry::network::{HttpPipeline, HttpRequest};
use storefront_telemetry::platform::{Document, DomEvent, ElementInfo, InMemoryTimeline, PerformanceEntry};
use storefront_telemetry::resource::ResourceTimingRecord;
use storefront_telemetry::{Aggregator, Collectors};

fn config(interval_ms: u64, max_data_points: usize) -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.aggregator.interval_ms = interval_ms;
    config.aggregator.max_data_points = max_data_points;
    config.behavior.flush_interval_ms = 600_000;
    config.performance.sample_interval_ms = 600_000;
    config.network.retry_policy.base_delay_ms = 1;
    config
}

fn build(config: &TelemetryConfig) -> (Harness, Arc<Aggregator>) {
    let harness = harness(config, ScriptedTransport::statuses(&[200]));
    let aggregator = Arc::new(
        Aggregator::new(
            config.aggregator.clone(),
            config.performance.thresholds.clone(),
            harness.collectors.clone(),
        )
        .unwrap(),
    );
    (harness, aggregator)
}

#[tokio::test]
async fn test_history_evicts_oldest_snapshots() {
    let (_, aggregator) = build(&config(60_000, 3));
    for ts in 1..=5 {
        aggregator.capture_at(ts);
    }

    let timestamps: Vec<_> = aggregator.get_data(None, None).iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![3, 4, 5]);
    assert_eq!(aggregator.latest().map(|s| s.timestamp), Some(5));
}

#[tokio::test]
async fn test_range_queries_are_inclusive() {
    let (_, aggregator) = build(&config(60_000, 100));
    for ts in [100, 200, 300, 400, 500] {
        aggregator.capture_at(ts);
    }

    let ts = |v: Vec<storefront_telemetry::Snapshot>| v.iter().map(|s| s.timestamp).collect::<Vec<_>>();
    assert_eq!(ts(aggregator.get_data(Some(200), Some(400))), vec![200, 300, 400]);
    assert_eq!(ts(aggregator.get_data(Some(450), None)), vec![500]);
    assert_eq!(ts(aggregator.get_data(None, Some(100))), vec![100]);
    assert!(aggregator.get_data(Some(600), Some(700)).is_empty());

    aggregator.clear_history();
    assert_eq!(aggregator.history_len(), 0);
}

#[tokio::test]
async fn test_analyses_are_absent_without_history() {
    let (_, aggregator) = build(&config(60_000, 10));
    assert!(aggregator.get_performance_analysis().is_none());
    assert!(aggregator.get_user_behavior_analysis().is_none());
    assert!(aggregator.get_error_analysis().is_none());
}

#[tokio::test]
async fn test_snapshots_reflect_every_collector() {
    let config = config(600_000, 10);
    let (harness, aggregator) = build(&config);

    // 1. Feed every collector one signal.
    harness.timeline.publish(PerformanceEntry::Resource(ResourceTimingRecord {
        name: "https://shop.test/app.js".to_string(),
        initiator_type: "script".to_string(),
        start_time: 0.0,
        duration: 80.0,
        transfer_size: 700 * 1024,
        decoded_body_size: 700 * 1024,
        encoded_body_size: 700 * 1024,
    }));

    aggregator.start();
    assert!(aggregator.is_running());

    harness.pipeline.execute(HttpRequest::get("https://shop.test/api/cart")).await.unwrap();
    harness.timeline.publish(PerformanceEntry::LargestContentfulPaint { start_time: 1800.0 });
    harness.document.dispatch(DomEvent::click(ElementInfo::new("button").with_id("buy"), "https://shop.test/"));
    harness.collectors.errors.capture_error("TypeError: price is undefined", None);
    settle().await;

    // 2. Verify the first snapshot sees each of them.
    let first = aggregator.capture_at(1_000);
    assert_eq!(first.network.total_requests, 1);
    assert_eq!(first.network.success_count, 1);
    assert_eq!(first.resources.total_resources, 1);
    assert_eq!(first.resources.warning_count, 1);
    assert_eq!(first.performance.largest_contentful_paint, Some(1800.0));
    assert_eq!(first.behavior.total_events, 1);
    assert_eq!(first.errors.total_errors, 1);

    // 3. A second round, then the analyses over both snapshots.
    harness.collectors.errors.capture_error("TypeError: price is undefined", None);
    harness.document.dispatch(DomEvent::click(ElementInfo::new("button").with_id("buy"), "https://shop.test/"));
    settle().await;
    aggregator.capture_at(2_000);

    let behavior = aggregator.get_user_behavior_analysis().unwrap();
    assert_eq!(behavior.total_events, 2);
    assert_eq!(behavior.average_events_per_interval, 1.0);
    assert_eq!(behavior.top_targets[0].target, "button#buy");

    let errors = aggregator.get_error_analysis().unwrap();
    assert_eq!(errors.total_errors, 2);
    assert_eq!(errors.errors_by_type["error"], 2);
    assert_eq!(errors.top_messages[0].count, 2);

    let performance = aggregator.get_performance_analysis().unwrap();
    assert_eq!(performance.analytics.sample_count, 2);
    assert_eq!(performance.resource_warning_count, 1);
    assert_eq!(performance.slowest_resource_types[0].initiator_type, "script");

    aggregator.stop();
    assert!(!aggregator.is_running());
    assert!(!harness.pipeline.is_intercepted());
}

#[tokio::test(start_paused = true)]
async fn test_timer_captures_until_stopped() {
    let (_, aggregator) = build(&config(1000, 100));

    aggregator.start();
    aggregator.start();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(aggregator.history_len(), 3, "a double start must not add a second timer");

    aggregator.stop();
    aggregator.stop();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(aggregator.history_len(), 3);

    aggregator.start();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(aggregator.history_len(), 4, "restart resumes capturing");
}

#[tokio::test]
async fn test_shutdown_flushes_buffered_behavior() {
    let (harness, aggregator) = build(&config(600_000, 10));
    aggregator.start();

    harness.document.dispatch(DomEvent::click(ElementInfo::new("a").with_id("home"), "https://shop.test/"));
    settle().await;
    assert_eq!(harness.collectors.behavior.events().len(), 1);

    aggregator.shutdown();
    assert!(!aggregator.is_running());

    let blocking: Vec<_> = harness.reporter.deliveries().into_iter().filter(|d| d.blocking).collect();
    assert_eq!(blocking.len(), 1);
    assert!(harness.collectors.behavior.events().is_empty());
}

#[tokio::test]
async fn test_export_bundles_the_requested_types() {
    let (harness, aggregator) = build(&config(600_000, 10));
    aggregator.start();
    harness.pipeline.execute(HttpRequest::get("https://shop.test/api")).await.unwrap();
    aggregator.capture();

    let file = aggregator
        .export(&[DataType::Network, DataType::Snapshots], ExportFormat::Json)
        .unwrap();
    assert!(file.filename.starts_with("monitoring_network-snapshots_"));
    assert!(file.filename.ends_with(".json"));

    let bundle: ExportBundle = serde_json::from_slice(&file.content).unwrap();
    assert_eq!(bundle.network.as_ref().map(Vec::len), Some(1));
    assert_eq!(bundle.snapshots.as_ref().map(Vec::len), Some(1));
    assert!(bundle.errors.is_none());

    let performance = aggregator.bundle(&[DataType::Performance]).performance.unwrap();
    assert_eq!(performance.len(), 1, "current metrics stand in for an empty sample history");

    aggregator.stop();
}

#[tokio::test]
async fn test_zero_interval_is_rejected_at_construction() {
    // 1. A zero aggregator interval never reaches the collectors.
    let mut invalid = config(600_000, 10);
    invalid.aggregator.interval_ms = 0;
    let built = Collectors::from_config(
        &invalid,
        Arc::new(HttpPipeline::new(ScriptedTransport::statuses(&[200]))),
        Arc::new(InMemoryTimeline::new()),
        Arc::new(Document::new()),
        MockReporter::new(),
        "test-session",
    );
    assert!(matches!(built, Err(ConfigError::Invalid { field: "aggregator.intervalMs", .. })));

    // 2. Nor does it reach the aggregator's own timer.
    let (harness, _) = build(&config(600_000, 10));
    let aggregator = Aggregator::new(
        AggregatorConfig { interval_ms: 0, max_data_points: 10 },
        TelemetryConfig::default().performance.thresholds,
        harness.collectors.clone(),
    );
    assert!(matches!(aggregator, Err(ConfigError::Invalid { field: "aggregator.intervalMs", .. })));
}
