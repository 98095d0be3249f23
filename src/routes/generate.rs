use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use garde::Validate;
use std::net::SocketAddr;

use super::client_identity;
use super::error::ApiError;
use crate::app_state::AppState;
use crate::models::generation::{ActionRequest, GenerateRequest};
use crate::models::job::JobOutcome;
use crate::services::admission::Admission;
use crate::services::job_client::JobError;

/// POST /generate-image — submit a prompt and wait for the finished grid.
pub async fn generate_image(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<JobOutcome>, ApiError> {
    let identity = client_identity(&state, &headers, peer);
    admit(&state, &identity)?;

    let req = validated(body, "Prompt is required")?;
    let prompt = req.prompt.unwrap_or_default();

    let result = state.engine.submit_prompt(&prompt).await;
    complete(&state, &identity, "generate-image", result)
}

/// POST /perform-action — run a follow-up action on an existing job.
pub async fn perform_action(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<JobOutcome>, ApiError> {
    let identity = client_identity(&state, &headers, peer);
    admit(&state, &identity)?;

    let req = validated(body, "CustomId and taskId are required")?;
    let custom_id = req.custom_id.unwrap_or_default();
    let task_id = req.task_id.unwrap_or_default();

    let result = state.engine.submit_action(&custom_id, &task_id).await;
    complete(&state, &identity, "perform-action", result)
}

/// Unwrap a JSON body, reporting a malformed body the same way as a
/// missing field. Runs after admission so cooling clients still get 429.
fn validated<T: Validate<Context = ()>>(
    body: Result<Json<T>, JsonRejection>,
    message: &str,
) -> Result<T, ApiError> {
    match body {
        Ok(Json(req)) => req
            .validate()
            .map(|_| req)
            .map_err(|_| ApiError::Validation(message.to_string())),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            Err(ApiError::Validation(message.to_string()))
        }
    }
}

fn admit(state: &AppState, identity: &str) -> Result<(), ApiError> {
    match state.submit_guard.check(identity) {
        Admission::Allowed => Ok(()),
        Admission::Denied { retry_after_minutes } => {
            tracing::info!(identity, retry_after_minutes, "Submission denied during cooldown");
            metrics::counter!("admission_denied_total", "table" => state.submit_guard.name())
                .increment(1);
            Err(ApiError::Denied { retry_after_minutes })
        }
    }
}

/// Settle the submission cooldown for a finished cycle and hand the image
/// to the store.
fn complete(
    state: &AppState,
    identity: &str,
    route: &'static str,
    result: Result<JobOutcome, JobError>,
) -> Result<Json<JobOutcome>, ApiError> {
    match result {
        Ok(outcome) => {
            state.submit_guard.record_success(identity);
            metrics::counter!("imagine_jobs_completed_total", "route" => route).increment(1);

            if state.save_images && !outcome.image_url.is_empty() {
                let images = state.images.clone();
                let image_url = outcome.image_url.clone();
                tokio::spawn(async move {
                    match images.save(&image_url).await {
                        Ok(path) => tracing::info!(path = %path.display(), "Image saved locally"),
                        Err(e) => {
                            tracing::error!(error = %e, image_url = %image_url, "Error saving image locally")
                        }
                    }
                });
            }

            Ok(Json(outcome))
        }
        Err(err) => {
            if err.counts_as_failure() {
                state.submit_guard.record_failure(identity);
                metrics::counter!("imagine_jobs_failed_total", "route" => route).increment(1);
            }
            tracing::error!(route, identity, error = %err, "Job cycle failed");
            Err(err.into())
        }
    }
}
