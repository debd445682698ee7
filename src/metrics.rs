//! Lightweight metrics helpers for keel.
//!
//! This module exposes a small set of convenience functions and RAII timers
//! wrapping the `metrics` crate macros, plus the Prometheus recorder whose
//! handle renders the `/metrics` exposition.
//!
//! Provided metrics (labels vary by family):
//! * `keel_requests_total` (counter; path, method, status)
//! * `keel_request_duration_seconds` (histogram; path, method)
//! * `keel_active_requests` (gauge)
//! * `keel_subsystem_enabled` (gauge per subsystem)
//!
//! [`RequestTimer`] leverages `Drop` to record durations even when the
//! downstream chain returns early.
use std::time::{Duration, Instant};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

pub const KEEL_REQUESTS_TOTAL: &str = "keel_requests_total";
pub const KEEL_REQUEST_DURATION_SECONDS: &str = "keel_request_duration_seconds";
pub const KEEL_ACTIVE_REQUESTS: &str = "keel_active_requests";
pub const KEEL_SUBSYSTEM_ENABLED: &str = "keel_subsystem_enabled"; // labels: subsystem

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        KEEL_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of HTTP requests processed."
    );
    describe_histogram!(
        KEEL_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests, measured around the whole downstream chain."
    );
    describe_gauge!(
        KEEL_ACTIVE_REQUESTS,
        "Number of currently active requests being processed."
    );
    describe_gauge!(
        KEEL_SUBSYSTEM_ENABLED,
        "Whether an optional subsystem was provisioned (1) or disabled (0)."
    );
});

/// Install the global Prometheus recorder and describe keel's metrics.
///
/// Fails if another recorder was installed first.
pub fn init_metrics() -> eyre::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus recorder: {e}"))?;
    Lazy::force(&DESCRIPTIONS);
    tracing::info!("keel metrics recorder installed");
    Ok(handle)
}

/// A handle backed by a recorder that is not installed globally.
///
/// Used when the process-wide recorder is already taken (tests, embedding).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Increment the total request counter.
pub fn increment_request_total(path: &str, method: &str, status: u16) {
    counter!(
        KEEL_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a completed request's duration.
pub fn record_request_duration(path: &str, method: &str, duration: Duration) {
    histogram!(
        KEEL_REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set current active in‑flight request count.
pub fn set_active_requests(count: u64) {
    gauge!(KEEL_ACTIVE_REQUESTS).set(count as f64);
}

pub fn set_subsystem_enabled(subsystem: &'static str, enabled: bool) {
    gauge!(KEEL_SUBSYSTEM_ENABLED, "subsystem" => subsystem).set(if enabled { 1.0 } else { 0.0 });
}

/// RAII helper measuring request duration.
pub struct RequestTimer {
    start: Instant,
    path: String,
    method: String,
}

impl RequestTimer {
    pub fn new(path: &str, method: &str) -> Self {
        Self {
            start: Instant::now(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.path, &self.method, self.start.elapsed());
    }
}
