use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the Prometheus recorder and describe the gateway's metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "imagine_jobs_submitted_total",
        "Jobs accepted by the Midjourney proxy"
    );
    metrics::describe_counter!(
        "imagine_jobs_completed_total",
        "Jobs that reached SUCCESS, by route"
    );
    metrics::describe_counter!(
        "imagine_jobs_failed_total",
        "Submit/poll cycles that failed, by route"
    );
    metrics::describe_histogram!(
        "imagine_job_duration_seconds",
        "Time from submission to terminal state"
    );
    metrics::describe_counter!(
        "admission_denied_total",
        "Requests refused during a cooldown, by table"
    );
    metrics::describe_counter!(
        "admission_cooldowns_total",
        "Cooldowns started, by table"
    );

    Ok(handle)
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
