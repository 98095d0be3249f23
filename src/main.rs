use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mj_imagine_gateway::app_state::AppState;
use mj_imagine_gateway::config::AppConfig;
use mj_imagine_gateway::routes;
use mj_imagine_gateway::services::job_client::MidjourneyClient;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing mj-imagine-gateway");

    let prometheus_handle =
        Arc::new(routes::metrics::install_recorder().expect("Failed to install Prometheus recorder"));

    tracing::info!(
        imagine_url = %config.imagine_url,
        action_url = %config.action_url,
        fetch_url_base = %config.fetch_url_base,
        "Initializing Midjourney proxy client"
    );
    let client = MidjourneyClient::new(
        config.mj_api_secret.clone(),
        config.imagine_url.clone(),
        config.action_url.clone(),
        config.fetch_url_base.clone(),
    )
    .expect("Failed to initialize Midjourney proxy client");

    let state =
        AppState::new(&config, Arc::new(client)).expect("Failed to initialize image store");

    tracing::info!(
        poll_interval_ms = config.poll_interval_ms,
        job_timeout_secs = config.job_timeout_secs,
        failure_threshold = config.failure_threshold,
        cooldown_ms = config.cooldown_ms,
        images_dir = %state.images.dir().display(),
        image_max_bytes = config.image_max_bytes,
        "Job engine configured"
    );

    // Drop cooldown records that no longer carry state
    let guards = [state.auth_guard.clone(), state.submit_guard.clone()];
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            for guard in &guards {
                let removed = guard.prune();
                if removed > 0 {
                    tracing::debug!(table = guard.name(), removed, "Pruned cooldown records");
                }
            }
        }
    });

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .merge(
            Router::new()
                .route("/metrics", get(routes::metrics::prometheus_metrics))
                .with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
