use crate::error::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
/// Held across the install so concurrent callers install exactly once.
static RECORDER_INSTALLED: Mutex<bool> = Mutex::new(false);

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the transfer engine.
///
/// Without an installed recorder every call is a no-op, so library users and
/// tests need no setup.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_transfer(&self, currency: &str) {
        counter!("ledger_transfers_total", "currency" => currency.to_string()).increment(1);
    }

    pub fn record_transfer_failed(&self, reason: &str) {
        counter!("ledger_transfers_failed_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn record_transfer_latency(&self, duration_ms: f64) {
        histogram!("ledger_transfer_duration_ms").record(duration_ms);
    }

    pub fn record_rollback(&self, reason: &str) {
        counter!("ledger_unit_of_work_rollbacks_total", "reason" => reason.to_string())
            .increment(1);
    }

    pub fn record_hook_failure(&self) {
        counter!("ledger_post_commit_hook_failures_total").increment(1);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder.
///
/// With an `exporter_addr` the exporter serves `/metrics` itself and must be
/// called from within a Tokio runtime; otherwise the rendered text is
/// available through [`render_metrics`]. Later calls are no-ops.
pub fn init_metrics(exporter_addr: Option<SocketAddr>) -> Result<()> {
    let mut installed = RECORDER_INSTALLED
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *installed {
        return Ok(());
    }

    let builder = PrometheusBuilder::new();
    match exporter_addr {
        Some(addr) => {
            builder
                .with_http_listener(addr)
                .install()
                .map_err(anyhow::Error::from)?;
            tracing::info!(%addr, "Prometheus exporter listening");
        }
        None => {
            let handle = builder.install_recorder().map_err(anyhow::Error::from)?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    *installed = true;
    describe_metrics();
    METRICS.get_or_init(Metrics::new);
    Ok(())
}

/// Renders the current metrics in Prometheus text format, if the recorder was
/// installed without its own listener.
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Describes all metrics for Prometheus.
fn describe_metrics() {
    describe_counter!("ledger_transfers_total", Unit::Count, "Total number of committed transfers");
    describe_counter!("ledger_transfers_failed_total", Unit::Count, "Total number of failed transfers");
    describe_histogram!("ledger_transfer_duration_ms", Unit::Milliseconds, "Transfer latency in milliseconds");
    describe_counter!("ledger_unit_of_work_rollbacks_total", Unit::Count, "Total number of rolled back units of work");
    describe_counter!("ledger_post_commit_hook_failures_total", Unit::Count, "Total number of failed post-commit hooks");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
