//! Integration tests for health stats module.
//!
//! These tests verify that HealthStats tracks poll cycles, failures and
//! HTTP requests, and that the rendered table carries every section.

use alertsite_exporter::health_stats::HealthStats;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_health_stats_initialize_empty() {
    let stats = HealthStats::new();

    let (cd_cur, cd_avg, _, _, cd_count) = stats.cycle_duration_seconds.snapshot();
    assert_eq!(cd_count, 0);
    assert_eq!(cd_cur, 0.0);
    assert_eq!(cd_avg, 0.0);

    assert_eq!(stats.total_cycles.load(Ordering::Relaxed), 0);
    assert_eq!(stats.token_failures.load(Ordering::Relaxed), 0);
    assert!(stats.since_last_success().is_none());
    assert_eq!(stats.get_last_success_time_str(), "N/A");
    // No cycles yet counts as healthy.
    assert_eq!(stats.get_cycle_success_rate(), 100.0);
}

#[test]
fn test_health_stats_recording_methods() {
    let stats = HealthStats::new();

    stats.record_cycle(0.8, 12, true);
    stats.record_cycle(1.2, 10, false);
    let (cd_cur, cd_avg, cd_max, cd_min, cd_count) = stats.cycle_duration_seconds.snapshot();
    assert_eq!(cd_count, 2);
    assert_eq!(cd_cur, 1.2);
    assert!((cd_avg - 1.0).abs() < 1e-9);
    assert_eq!(cd_max, 1.2);
    assert_eq!(cd_min, 0.8);

    let (te_cur, _, te_max, _, _) = stats.targets_exported.snapshot();
    assert_eq!(te_cur, 10.0);
    assert_eq!(te_max, 12.0);

    assert_eq!(stats.total_cycles.load(Ordering::Relaxed), 2);
    assert_eq!(stats.cycle_success_count.load(Ordering::Relaxed), 1);
    assert_eq!(stats.cycle_failure_count.load(Ordering::Relaxed), 1);
    assert_eq!(stats.get_cycle_success_rate(), 50.0);
    assert!(stats.since_last_success().is_some());

    stats.record_token_failure();
    stats.record_token_rejection();
    stats.record_region_failure();
    stats.record_region_failure();
    stats.record_render_failure();
    stats.record_cycle_panic();
    stats.record_publish();
    assert_eq!(stats.token_failures.load(Ordering::Relaxed), 1);
    assert_eq!(stats.token_rejections.load(Ordering::Relaxed), 1);
    assert_eq!(stats.region_failures.load(Ordering::Relaxed), 2);
    assert_eq!(stats.render_failures.load(Ordering::Relaxed), 1);
    assert_eq!(stats.cycle_panics.load(Ordering::Relaxed), 1);
    assert_eq!(stats.publish_count.load(Ordering::Relaxed), 1);

    stats.record_http_request();
    stats.record_http_request();
    stats.record_metrics_endpoint_call();
    assert_eq!(stats.http_request_timestamps.count_last_minute(), 2);
    assert_eq!(stats.metrics_endpoint_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn test_health_stats_render_table_contains_sections() {
    let stats = Arc::new(HealthStats::new());
    stats.record_cycle(0.5, 7, true);
    stats.record_region_failure();
    stats.record_http_request();

    let output = stats.render_table();

    for section in ["POLL CYCLES", "ERRORS", "HTTP SERVER"] {
        assert!(output.contains(section), "Should contain {section} section");
    }
    for metric in [
        "cycle_duration (s)",
        "targets_exported",
        "total_cycles",
        "cycle_success_rate (%)",
        "snapshots_published",
        "last_successful_cycle",
        "token_failures",
        "region_failures",
        "cycle_panics",
        "requests_last_minute",
        "metrics_endpoint_calls",
    ] {
        assert!(output.contains(metric), "Should contain {metric} metric");
    }
    assert!(output.contains("UTC"), "Last success time should be rendered");
}

#[test]
fn test_health_stats_concurrent_updates() {
    let stats = Arc::new(HealthStats::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let stats = stats.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    stats.record_cycle(0.1, 1, true);
                    stats.record_http_request();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(stats.total_cycles.load(Ordering::Relaxed), 800);
    let (_, _, _, _, count) = stats.cycle_duration_seconds.snapshot();
    assert_eq!(count, 800);
    assert_eq!(stats.http_request_timestamps.count_last_minute(), 800);
}
