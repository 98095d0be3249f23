use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;

use super::error::ApiError;
use crate::app_state::AppState;
use crate::models::generation::DownloadQuery;

/// GET /download-image?url= — relay a remote image as an attachment.
///
/// The body is streamed through as it arrives. A transfer that crosses the
/// size cap after the headers went out is cut short.
pub async fn download_image(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let url = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::Validation("Image URL is required.".to_string()))?;

    let download = state.images.open(&url).await?;
    let content_type = download
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename(&[]).replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.into_stream()),
    ))
}
