mod common;

use std::sync::Arc;

use common::settle;
use storefront_telemetry::collector::Collector;
use storefront_telemetry::config::ResourceConfig;
use storefront_telemetry::platform::{EntryKind, InMemoryTimeline, PerformanceEntry};
use storefront_telemetry::resource::{ResourceMonitor, ResourceTimingRecord, WarningKind};

fn entry(name: &str, initiator_type: &str, transfer_size: u64, duration: f64) -> PerformanceEntry {
    PerformanceEntry::Resource(ResourceTimingRecord {
        name: name.to_string(),
        initiator_type: initiator_type.to_string(),
        start_time: 10.0,
        duration,
        transfer_size,
        decoded_body_size: transfer_size,
        encoded_body_size: transfer_size,
    })
}

fn setup(config: ResourceConfig) -> (Arc<InMemoryTimeline>, ResourceMonitor) {
    let timeline = Arc::new(InMemoryTimeline::new());
    let monitor = ResourceMonitor::new(config, timeline.clone());
    (timeline, monitor)
}

#[tokio::test]
async fn test_oversized_scripts_each_raise_a_size_warning() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    monitor.start();

    for i in 0..3 {
        timeline.publish(entry(&format!("https://shop.test/bundle-{}.js", i), "script", 600 * 1024, 120.0));
    }
    settle().await;

    let warnings = monitor.warnings();
    assert_eq!(warnings.len(), 3);
    assert!(warnings.iter().all(|w| w.kind == WarningKind::Size));
    assert_eq!(warnings[0].threshold, Some(500.0 * 1024.0));

    let stats = monitor.stats();
    assert_eq!(stats.total_resources, 3);
    assert_eq!(stats.by_type["script"].count, 3);
    assert_eq!(stats.by_type["script"].total_size, 3 * 600 * 1024);
}

#[tokio::test]
async fn test_empty_load_is_reported_once_as_an_error() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    monitor.start();

    let mut failed = entry("https://shop.test/missing.css", "css", 0, 15.0);
    if let PerformanceEntry::Resource(record) = &mut failed {
        record.decoded_body_size = 0;
    }
    timeline.publish(failed);
    settle().await;

    let warnings = monitor.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::Error);
    assert_eq!(warnings[0].resource, "https://shop.test/missing.css");
}

#[tokio::test]
async fn test_slow_load_raises_a_performance_warning() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    monitor.start();

    timeline.publish(entry("https://shop.test/hero.jpg", "img", 20 * 1024, 4500.0));
    settle().await;

    let warnings = monitor.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::Performance);
    assert_eq!(warnings[0].value, Some(4500.0));
}

#[tokio::test]
async fn test_loads_completed_before_start_are_scanned() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    timeline.publish(entry("https://shop.test/app.js", "script", 10 * 1024, 50.0));
    timeline.publish(entry("https://shop.test/site.css", "css", 5 * 1024, 20.0));

    monitor.start();
    timeline.publish(entry("https://shop.test/late.js", "script", 10 * 1024, 50.0));
    settle().await;

    let names: Vec<_> = monitor.resource_timings().into_iter().map(|r| r.name).collect();
    assert_eq!(
        names,
        vec![
            "https://shop.test/app.js",
            "https://shop.test/site.css",
            "https://shop.test/late.js",
        ]
    );
}

#[tokio::test]
async fn test_disallowed_and_ignored_resources_are_skipped() {
    let config = ResourceConfig {
        ignore_patterns: vec!["analytics".to_string()],
        ..ResourceConfig::default()
    };
    let (timeline, monitor) = setup(config);
    monitor.start();

    timeline.publish(entry("https://shop.test/movie.mp4", "video", 50 * 1024 * 1024, 10.0));
    timeline.publish(entry("https://cdn.test/analytics.js", "script", 900 * 1024, 10.0));
    timeline.publish(entry("https://shop.test/app.js", "script", 1024, 10.0));
    settle().await;

    assert_eq!(monitor.resource_timings().len(), 1);
    assert!(monitor.warnings().is_empty());
}

#[tokio::test]
async fn test_unsupported_host_leaves_the_monitor_idle() {
    let timeline = Arc::new(InMemoryTimeline::new().with_unsupported([EntryKind::Resource]));
    let monitor = ResourceMonitor::new(ResourceConfig::default(), timeline.clone());

    monitor.start();
    timeline.publish(entry("https://shop.test/app.js", "script", 1024, 10.0));
    settle().await;

    assert!(monitor.resource_timings().is_empty());
    assert_eq!(timeline.subscriber_count(), 0);
}

#[tokio::test]
async fn test_stop_detaches_from_the_timeline() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    monitor.start();
    monitor.start();
    assert_eq!(timeline.subscriber_count(), 1);

    monitor.stop();
    settle().await;
    assert!(!monitor.is_running());
    assert_eq!(timeline.subscriber_count(), 0);

    timeline.publish(entry("https://shop.test/after.js", "script", 1024, 10.0));
    settle().await;
    assert!(monitor.resource_timings().is_empty());
}

#[tokio::test]
async fn test_suggestions_follow_the_collected_stats() {
    let (timeline, monitor) = setup(ResourceConfig::default());
    monitor.start();
    for i in 0..2 {
        timeline.publish(entry(&format!("https://shop.test/vendor-{}.js", i), "script", 800 * 1024, 1500.0));
    }
    settle().await;

    let suggestions = monitor.suggestions();
    assert!(suggestions.iter().any(|s| s.contains("script")));

    monitor.clear();
    assert_eq!(monitor.stats().total_resources, 0);
    assert!(monitor.suggestions().is_empty());
}

#[tokio::test]
async fn test_restart_scans_each_load_once() {
    let (timeline, monitor) = setup(ResourceConfig::default());

    // 1. Three oversized scripts arrive while running.
    monitor.start();
    for i in 0..3 {
        timeline.publish(entry(&format!("https://shop.test/chunk-{}.js", i), "script", 600 * 1024, 120.0));
    }
    settle().await;
    assert_eq!(monitor.stats().total_resources, 3);

    // 2. Restart with nothing new buffered.
    monitor.stop();
    monitor.start();
    settle().await;
    assert_eq!(monitor.stats().total_resources, 3);
    assert_eq!(monitor.warnings().len(), 3);

    // 3. A load completed while stopped is picked up once on the next start.
    monitor.stop();
    timeline.publish(entry("https://shop.test/late.js", "script", 1024, 10.0));
    monitor.start();
    monitor.stop();
    monitor.start();
    settle().await;

    assert_eq!(monitor.stats().total_resources, 4);
    assert_eq!(monitor.warnings().len(), 3);
    monitor.stop();
}
