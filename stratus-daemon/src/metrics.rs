//! Prometheus metrics for backup runs.
//!
//! All metrics live in their own [`Registry`] under the `backup` namespace and are updated by
//! the [`Runner`](crate::runner::Runner) only. Prometheus metrics are atomic, so the exposition
//! endpoint can encode them at any time, including while a backup is running.

use crate::state::RunStatus;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use stratus_core::output::Stats;

const NAMESPACE: &str = "backup";

/// Buckets for backup durations in milliseconds, from 5 minutes to 12 hours.
const DURATION_BUCKETS_MS: &[f64] = &[
    300_000.0,
    900_000.0,
    1_800_000.0,
    3_600_000.0,
    7_200_000.0,
    14_400_000.0,
    28_800_000.0,
    43_200_000.0,
];

const FILE_COUNT_BUCKETS: &[f64] = &[5.0, 50.0, 500.0, 5e3, 5e4, 5e5, 5e6];

/// Buckets for byte sizes, from 1 MB to 10 TB.
const FILE_SIZE_BUCKETS: &[f64] = &[1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to register metric")]
    RegistrationFailed(#[from] prometheus::Error),
    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    runs_total: IntCounter,
    runs_successful: IntCounter,
    runs_failed: IntCounter,
    status: IntGauge,
    last_success_timestamp: Gauge,
    duration_ms: Histogram,
    files_new: Histogram,
    files_changed: Histogram,
    files_unmodified: Histogram,
    files_processed: Histogram,
    bytes_added: Histogram,
    bytes_processed: Histogram,
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

fn histogram_opts(name: &str, help: &str, buckets: &[f64]) -> HistogramOpts {
    HistogramOpts::new(name, help)
        .namespace(NAMESPACE)
        .buckets(buckets.to_vec())
}

fn instance_name() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(error) => {
            tracing::warn!(%error, "failed to get hostname for info metric");
            "unknown".to_owned()
        }
    }
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let runs_total = IntCounter::with_opts(opts(
            "backups_all_total",
            "The total number of backups attempted, including failures.",
        ))?;
        let runs_successful = IntCounter::with_opts(opts(
            "backups_successful_total",
            "The total number of backups that succeeded.",
        ))?;
        let runs_failed = IntCounter::with_opts(opts(
            "backups_failed_total",
            "The total number of backups that failed.",
        ))?;
        let status = IntGauge::with_opts(opts(
            "backup_status",
            "Backup status (1 = backing up, 0 = idle, -1 = idle after failed backup)",
        ))?;
        let last_success_timestamp = Gauge::with_opts(opts(
            "backup_successful_timestamp",
            "Timestamp of last successful backup",
        ))?;
        let info = IntGauge::with_opts(
            opts("backup_info", "Information about the backup process")
                .const_label("hostname", instance_name())
                .const_label("version", stratus_core::VERSION),
        )?;
        info.set(1);

        let duration_ms = Histogram::with_opts(histogram_opts(
            "backup_duration_milliseconds",
            "The duration of backups in milliseconds.",
            DURATION_BUCKETS_MS,
        ))?;
        let files_new = Histogram::with_opts(histogram_opts(
            "backup_files_new",
            "Amount of new files.",
            FILE_COUNT_BUCKETS,
        ))?;
        let files_changed = Histogram::with_opts(histogram_opts(
            "backup_files_changed",
            "Amount of files with changes.",
            FILE_COUNT_BUCKETS,
        ))?;
        let files_unmodified = Histogram::with_opts(histogram_opts(
            "backup_files_unmodified",
            "Amount of files unmodified since last backup.",
            FILE_COUNT_BUCKETS,
        ))?;
        let files_processed = Histogram::with_opts(histogram_opts(
            "backup_files_processed",
            "Total number of files scanned by the backup for changes.",
            FILE_COUNT_BUCKETS,
        ))?;
        let bytes_added = Histogram::with_opts(histogram_opts(
            "backup_added_bytes",
            "Total number of bytes added to the repository.",
            FILE_SIZE_BUCKETS,
        ))?;
        let bytes_processed = Histogram::with_opts(histogram_opts(
            "backup_processed_bytes",
            "Total number of bytes scanned by the backup for changes.",
            FILE_SIZE_BUCKETS,
        ))?;

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(runs_successful.clone()))?;
        registry.register(Box::new(runs_failed.clone()))?;
        registry.register(Box::new(status.clone()))?;
        registry.register(Box::new(last_success_timestamp.clone()))?;
        registry.register(Box::new(info))?;
        for histogram in [
            &duration_ms,
            &files_new,
            &files_changed,
            &files_unmodified,
            &files_processed,
            &bytes_added,
            &bytes_processed,
        ] {
            registry.register(Box::new(histogram.clone()))?;
        }

        Ok(Metrics {
            registry,
            runs_total,
            runs_successful,
            runs_failed,
            status,
            last_success_timestamp,
            duration_ms,
            files_new,
            files_changed,
            files_unmodified,
            files_processed,
            bytes_added,
            bytes_processed,
        })
    }

    pub fn set_status(&self, status: RunStatus) {
        self.status.set(status.gauge_value());
    }

    pub fn record_success(&self, timestamp: time::OffsetDateTime) {
        self.runs_total.inc();
        self.runs_successful.inc();
        self.last_success_timestamp
            .set(timestamp.unix_timestamp_nanos() as f64 / 1e9);
    }

    pub fn record_failure(&self) {
        self.runs_total.inc();
        self.runs_failed.inc();
    }

    pub fn record_stats(&self, duration: Duration, stats: &Stats) {
        self.duration_ms.observe(duration.as_millis() as f64);
        self.files_new.observe(stats.files_new as f64);
        self.files_changed.observe(stats.files_changed as f64);
        self.files_unmodified.observe(stats.files_unmodified as f64);
        self.files_processed.observe(stats.files_processed as f64);
        self.bytes_added.observe(stats.bytes_added as f64);
        self.bytes_processed.observe(stats.bytes_processed as f64);
    }

    pub fn runs_total(&self) -> u64 {
        self.runs_total.get()
    }

    pub fn runs_successful(&self) -> u64 {
        self.runs_successful.get()
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.get()
    }

    pub fn status(&self) -> i64 {
        self.status.get()
    }

    pub fn last_success_timestamp(&self) -> f64 {
        self.last_success_timestamp.get()
    }

    /// Encodes all metrics in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
    }
}
