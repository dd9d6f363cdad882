mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settle, MockReporter};
use storefront_telemetry::collector::Collector;
use storefront_telemetry::config::PerformanceConfig;
use storefront_telemetry::performance::PerformanceCollector;
use storefront_telemetry::platform::{
    EntryKind, InMemoryTimeline, MemorySample, PerformanceEntry, TimingKind,
};

const ENDPOINT: &str = "http://collector.test/performance";

fn config(sample_interval_ms: u64, report: bool) -> PerformanceConfig {
    PerformanceConfig {
        sample_interval_ms,
        report,
        ..PerformanceConfig::default()
    }
}

fn setup(
    config: PerformanceConfig,
    timeline: Arc<InMemoryTimeline>,
) -> (Arc<MockReporter>, PerformanceCollector) {
    let reporter = MockReporter::new();
    let collector = PerformanceCollector::new(config, timeline, reporter.clone(), ENDPOINT);
    (reporter, collector)
}

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("metric should be set");
    assert!((actual - expected).abs() < 1e-6, "expected {}, got {}", expected, actual);
}

#[tokio::test]
async fn test_page_load_metrics_keep_the_last_value() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(60_000, false), timeline.clone());
    collector.start();

    timeline.publish(PerformanceEntry::Paint { name: "first-paint".into(), start_time: 100.0 });
    timeline.publish(PerformanceEntry::Paint { name: "first-paint".into(), start_time: 120.0 });
    timeline.publish(PerformanceEntry::Paint { name: "first-contentful-paint".into(), start_time: 180.0 });
    timeline.publish(PerformanceEntry::LargestContentfulPaint { start_time: 900.0 });
    timeline.publish(PerformanceEntry::LargestContentfulPaint { start_time: 1400.0 });
    settle().await;

    let metrics = collector.metrics();
    assert_eq!(metrics.first_paint, Some(120.0));
    assert_eq!(metrics.first_contentful_paint, Some(180.0));
    assert_eq!(metrics.largest_contentful_paint, Some(1400.0));
}

#[tokio::test]
async fn test_derived_metrics_are_computed_from_entries() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(60_000, false), timeline.clone());
    collector.start();

    timeline.publish(PerformanceEntry::FirstInput { start_time: 1000.0, processing_start: 1042.0 });
    timeline.publish(PerformanceEntry::Navigation { request_start: 50.0, response_start: 230.0 });
    timeline.publish(PerformanceEntry::LayoutShift { value: 0.05, had_recent_input: false });
    timeline.publish(PerformanceEntry::LayoutShift { value: 0.3, had_recent_input: true });
    timeline.publish(PerformanceEntry::LayoutShift { value: 0.1, had_recent_input: false });
    timeline.publish(PerformanceEntry::Measure { kind: TimingKind::Script, duration: 200.0 });
    timeline.publish(PerformanceEntry::Measure { kind: TimingKind::Script, duration: 300.0 });
    timeline.publish(PerformanceEntry::Measure { kind: TimingKind::Layout, duration: 40.0 });
    settle().await;

    let metrics = collector.metrics();
    approx(metrics.first_input_delay, 42.0);
    approx(metrics.time_to_first_byte, 180.0);
    approx(metrics.cumulative_layout_shift, 0.15);
    assert_eq!(metrics.script_time_ms, 500.0);
    assert_eq!(metrics.layout_time_ms, 40.0);
    assert_eq!(metrics.paint_time_ms, 0.0);
}

#[tokio::test]
async fn test_frame_entries_produce_a_frame_rate() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(60_000, false), timeline.clone());
    collector.start();

    for i in 0..=60 {
        timeline.publish(PerformanceEntry::Frame { timestamp_ms: i as f64 * 1000.0 / 60.0 });
    }
    settle().await;

    approx(collector.metrics().fps, 60.0);
}

#[tokio::test]
async fn test_entries_buffered_before_start_are_applied() {
    let timeline = Arc::new(InMemoryTimeline::new());
    timeline.publish(PerformanceEntry::Navigation { request_start: 10.0, response_start: 90.0 });
    let (_, collector) = setup(config(60_000, false), timeline.clone());

    collector.start();
    approx(collector.metrics().time_to_first_byte, 80.0);
}

#[tokio::test(start_paused = true)]
async fn test_sampler_reads_memory_and_keeps_history() {
    let timeline = Arc::new(InMemoryTimeline::new());
    timeline.set_memory(Some(MemorySample { used_bytes: 50, limit_bytes: 200 }));
    let (reporter, collector) = setup(config(1000, false), timeline.clone());
    assert!(collector.analytics().is_none());

    collector.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(collector.metrics().memory_usage_percent, Some(25.0));
    let history = collector.history();
    assert_eq!(history.len(), 2);
    assert_eq!(collector.analytics().map(|a| a.sample_count), Some(2));
    assert!(reporter.deliveries().is_empty(), "reporting is off by default");
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_signals_degrade_to_noops() {
    let timeline = Arc::new(
        InMemoryTimeline::new().with_unsupported([EntryKind::FirstInput, EntryKind::Memory]),
    );
    timeline.set_memory(Some(MemorySample { used_bytes: 50, limit_bytes: 100 }));
    let (_, collector) = setup(config(1000, false), timeline.clone());

    collector.start();
    timeline.publish(PerformanceEntry::FirstInput { start_time: 0.0, processing_start: 10.0 });
    timeline.publish(PerformanceEntry::Paint { name: "first-paint".into(), start_time: 75.0 });
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let metrics = collector.metrics();
    assert_eq!(metrics.first_input_delay, None);
    assert_eq!(metrics.memory_usage_percent, None);
    assert_eq!(metrics.first_paint, Some(75.0));
    assert_eq!(collector.history().len(), 1, "sampling continues without memory");
}

#[tokio::test(start_paused = true)]
async fn test_sampled_metrics_are_reported_when_enabled() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (reporter, collector) = setup(config(1000, true), timeline.clone());
    collector.start();

    timeline.publish(PerformanceEntry::LargestContentfulPaint { start_time: 2100.0 });
    tokio::time::sleep(Duration::from_millis(1100)).await;
    settle().await;

    let deliveries = reporter.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].endpoint, ENDPOINT);
    assert_eq!(deliveries[0].body["largestContentfulPaint"], 2100.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_observation_and_sampling() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(1000, false), timeline.clone());

    collector.start();
    collector.start();
    assert_eq!(timeline.subscriber_count(), 1);

    collector.stop();
    settle().await;
    assert!(!collector.is_running());
    assert_eq!(timeline.subscriber_count(), 0);

    timeline.publish(PerformanceEntry::Paint { name: "first-paint".into(), start_time: 5.0 });
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(collector.metrics().first_paint, None);
    assert!(collector.history().is_empty());

    collector.clear();
    assert_eq!(collector.metrics(), Default::default());
}

#[tokio::test]
async fn test_restart_does_not_replay_consumed_entries() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(60_000, false), timeline.clone());

    // 1. Consume a measure and a layout shift while running.
    collector.start();
    timeline.publish(PerformanceEntry::Measure { kind: TimingKind::Script, duration: 200.0 });
    timeline.publish(PerformanceEntry::LayoutShift { value: 0.1, had_recent_input: false });
    settle().await;
    assert_eq!(collector.metrics().script_time_ms, 200.0);

    // 2. Publish while stopped, then restart twice.
    collector.stop();
    timeline.publish(PerformanceEntry::Measure { kind: TimingKind::Layout, duration: 40.0 });
    collector.start();
    settle().await;
    collector.stop();
    collector.start();
    settle().await;

    // 3. Every entry counted exactly once.
    let metrics = collector.metrics();
    assert_eq!(metrics.script_time_ms, 200.0);
    assert_eq!(metrics.layout_time_ms, 40.0);
    approx(metrics.cumulative_layout_shift, 0.1);
    collector.stop();
}

#[tokio::test(start_paused = true)]
async fn test_zero_sample_interval_still_samples() {
    let timeline = Arc::new(InMemoryTimeline::new());
    let (_, collector) = setup(config(0, false), timeline.clone());

    collector.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(collector.is_running());
    assert!(!collector.history().is_empty());
    collector.stop();
}
