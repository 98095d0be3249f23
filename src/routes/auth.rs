use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::net::SocketAddr;

use super::client_identity;
use crate::app_state::AppState;
use crate::models::generation::{AuthRequest, AuthResponse};
use crate::services::admission::Admission;

/// POST /auth — check the shared access code.
pub async fn authenticate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<AuthRequest>, JsonRejection>,
) -> (StatusCode, Json<AuthResponse>) {
    let identity = client_identity(&state, &headers, peer);

    if let Admission::Denied { retry_after_minutes } = state.auth_guard.check(&identity) {
        metrics::counter!("admission_denied_total", "table" => state.auth_guard.name()).increment(1);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(AuthResponse {
                success: false,
                message: None,
                error: Some(format!(
                    "Too many authentication attempts. Please try again in {retry_after_minutes} minutes."
                )),
            }),
        );
    }

    // A body that is not JSON is a wrong password, not a free retry.
    let password = body.ok().and_then(|Json(req)| req.password).unwrap_or_default();

    if password == *state.access_code {
        state.auth_guard.record_success(&identity);
        tracing::info!(identity = %identity, "Authentication succeeded");
        (
            StatusCode::OK,
            Json(AuthResponse {
                success: true,
                message: Some("Authentication successful".to_string()),
                error: None,
            }),
        )
    } else {
        state.auth_guard.record_failure(&identity);
        tracing::warn!(identity = %identity, "Authentication failed");
        (
            StatusCode::UNAUTHORIZED,
            Json(AuthResponse {
                success: false,
                message: None,
                error: Some("Invalid password".to_string()),
            }),
        )
    }
}
