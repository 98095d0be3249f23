//! Shared helpers for driving the router in-process.

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use mj_imagine_gateway::app_state::AppState;
use mj_imagine_gateway::config::AppConfig;
use mj_imagine_gateway::routes;
use mj_imagine_gateway::services::mock::ScriptedJobApi;

pub const CLIENT_ADDR: ([u8; 4], u16) = ([10, 1, 2, 3], 51000);
pub const ACCESS_CODE: &str = "open-sesame";

pub fn test_config(extra: &[(&str, &str)]) -> AppConfig {
    let mut vars = vec![
        ("MJ_API_SECRET", "sk-test"),
        ("IMAGINE_URL", "http://mj.invalid/mj/submit/imagine"),
        ("ACTION_URL", "http://mj.invalid/mj/submit/action"),
        ("FETCH_URL_BASE", "http://mj.invalid/mj/task/"),
        ("ACCESS_CODE", ACCESS_CODE),
        ("POLL_INTERVAL_MS", "5"),
        ("SAVE_IMAGES", "false"),
    ];
    vars.extend_from_slice(extra);

    envy::from_iter(
        vars.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .expect("valid test configuration")
}

pub fn build_test_app(api: Arc<ScriptedJobApi>, config: &AppConfig) -> Router {
    let state = AppState::new(config, api).expect("valid test state");
    routes::router(state).layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)))
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(
        app,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
