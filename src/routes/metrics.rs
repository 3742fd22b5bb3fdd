use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Metric names recorded by the pipeline, with their help text.
pub fn describe_metrics() {
    metrics::describe_counter!("photo_jobs_submitted_total", "Photo jobs accepted for processing");
    metrics::describe_counter!("photo_jobs_completed_total", "Photo jobs that reached completed");
    metrics::describe_counter!("photo_jobs_failed_total", "Photo jobs that reached failed");
    metrics::describe_counter!(
        "photo_step_failures_total",
        "Processing steps that failed without failing their job, by step"
    );
    metrics::describe_histogram!(
        "photo_processing_seconds",
        "Time from pickup to terminal state for a photo job"
    );
    metrics::describe_gauge!("photo_queue_depth", "Photo jobs waiting for a worker");
}

/// Prometheus scrape endpoint in text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
