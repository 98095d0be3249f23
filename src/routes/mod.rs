pub mod auth;
pub mod download;
pub mod error;
pub mod generate;
pub mod health;
pub mod metrics;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;

use crate::app_state::AppState;

/// Application routes. The caller adds `/metrics` and the tower layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/auth", post(auth::authenticate))
        .route("/generate-image", post(generate::generate_image))
        .route("/perform-action", post(generate::perform_action))
        .route("/download-image", get(download::download_image))
        .with_state(state)
}

/// Admission-control key for a request: the peer IP, or the first
/// `X-Forwarded-For` hop when the deployment sits behind a trusted proxy.
pub fn client_identity(state: &AppState, headers: &HeaderMap, peer: SocketAddr) -> String {
    if state.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.ip().to_string()
}
