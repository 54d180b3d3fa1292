//! Prometheus metrics for cache, runner, tracker, and store activity.
//!
//! - Cache hit/miss/coalesced counters and producer duration histograms
//! - Runner queue depth gauge and task outcome counters
//! - Tracker schedule/report counters
//! - Error counters by code (recorded from the error module)

use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for producer/task durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

// Default value functions
fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ]
}

/// Handle to the installed Prometheus recorder.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Initialize the metrics subsystem.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry {
            prometheus_handle: None,
        });
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

/// Register all metric descriptions.
fn register_metric_descriptions() {
    // Cache metrics
    describe_counter!("adsync_cache_hits_total", "Cache reads served from the store");
    describe_counter!(
        "adsync_cache_misses_total",
        "Cache reads that ran the producer"
    );
    describe_counter!(
        "adsync_cache_coalesced_reads_total",
        "Store reads saved by request coalescing"
    );
    describe_histogram!(
        "adsync_cache_producer_duration_seconds",
        "Producer execution duration in seconds"
    );

    // Runner metrics
    describe_gauge!("adsync_runner_queue_depth", "Tasks waiting in the runner queue");
    describe_counter!("adsync_runner_tasks_total", "Tasks accepted by the runner");
    describe_counter!(
        "adsync_runner_tasks_completed",
        "Tasks that ran to completion"
    );
    describe_counter!(
        "adsync_runner_tasks_panicked",
        "Tasks that panicked during execution"
    );
    describe_counter!(
        "adsync_runner_tasks_discarded",
        "Queued tasks discarded by a runner stop"
    );
    describe_histogram!(
        "adsync_runner_task_duration_seconds",
        "Task execution duration in seconds"
    );

    // Tracker metrics
    describe_counter!(
        "adsync_tracker_windows_scheduled_total",
        "Report windows written as queued"
    );
    describe_counter!(
        "adsync_tracker_windows_skipped_total",
        "Windows skipped because an entry with the same identity was active"
    );
    describe_counter!(
        "adsync_tracker_status_reports_total",
        "Status transitions written for report windows"
    );

    // Error metrics
    describe_counter!("adsync_errors_total", "Errors by code and category");
}

/// Error counter keyed by code and category.
pub struct ErrorCounter;

impl ErrorCounter {
    pub fn increment(category: &str, code: &str) {
        counter!(
            "adsync_errors_total",
            "category" => category.to_string(),
            "code" => code.to_string(),
        )
        .increment(1);
    }
}
