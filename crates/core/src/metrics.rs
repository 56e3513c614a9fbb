//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline (links processed, step failures)
//! - Browser sessions (opened, closed)
//! - Download capture (bytes saved, file sizes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Links processed by outcome.
pub static LINKS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("teradl_links_processed_total", "Total links processed"),
        &["outcome"], // "saved", "skipped", "failed"
    )
    .unwrap()
});

/// Mandatory steps that ended a link, by step.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "teradl_step_failures_total",
            "UI steps that abandoned a link",
        ),
        &["step"],
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

pub static SESSIONS_OPENED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "teradl_sessions_opened_total",
        "Browser sessions launched",
    )
    .unwrap()
});

pub static SESSIONS_CLOSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "teradl_sessions_closed_total",
        "Browser sessions torn down",
    )
    .unwrap()
});

// =============================================================================
// Capture Metrics
// =============================================================================

/// Bytes promoted into the output directory.
pub static BYTES_SAVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "teradl_bytes_saved_total",
        "Bytes written to the output directory",
    )
    .unwrap()
});

/// Size of every completed transfer, accepted or rejected, in megabytes.
pub static DOWNLOAD_SIZE_MB: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("teradl_download_size_mb", "Completed transfer size")
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0]),
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(LINKS_PROCESSED.clone()),
        Box::new(STEP_FAILURES.clone()),
        // Sessions
        Box::new(SESSIONS_OPENED.clone()),
        Box::new(SESSIONS_CLOSED.clone()),
        // Capture
        Box::new(BYTES_SAVED.clone()),
        Box::new(DOWNLOAD_SIZE_MB.clone()),
    ]
}
