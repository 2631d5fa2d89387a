use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time registration of the digest series.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_jobs_total", "Pipeline jobs started.");
        describe_counter!("digest_job_failures_total", "Pipeline jobs that produced no report.");
        describe_counter!(
            "digest_source_errors_total",
            "Source export failures seen by the pipeline."
        );
        describe_counter!("digest_reports_written_total", "Reports written to disk.");
        describe_counter!("digest_delivery_failures_total", "Notification attempts that failed.");
        describe_histogram!("digest_backend_ms", "Text-generation call time in milliseconds.");
        describe_gauge!("digest_last_run_ts", "Unix time of the last completed run.");
    });
}
