use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::services::image_store::ImageStoreError;
use crate::services::job_client::JobError;

/// Error type for HTTP handlers, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Too many requests. Please try again in {retry_after_minutes} minutes.")]
    Denied { retry_after_minutes: i64 },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Failed to download image.")]
    Download(#[from] ImageStoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Denied { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Validation(_) | ApiError::Job(JobError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Download(err) => {
                tracing::error!(error = %err, "Error downloading image");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
