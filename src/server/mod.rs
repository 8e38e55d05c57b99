//! HTTP surface: session lifecycle and scenario execution endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::core::{BrowserDriver, LaunchProfile, ServerConfig};
use crate::errors::ScenaristError;
use crate::registry::SessionRegistry;
use crate::scenario::{run_scenario, ScenarioStatus, ScenarioStep};

pub struct AppState<B: BrowserDriver> {
    pub registry: Arc<SessionRegistry<B>>,
}

impl<B: BrowserDriver> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Request-level failure. Registry rejections are the caller's fault;
/// everything else is a server-side failure.
pub struct ApiError(pub ScenaristError);

impl From<ScenaristError> for ApiError {
    fn from(err: ScenaristError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ScenaristError::DuplicateKey(_)
            | ScenaristError::UnknownSession(_)
            | ScenaristError::InvalidPageIndex { .. }
            | ScenaristError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn build_router<B: BrowserDriver + Default>(state: AppState<B>) -> Router {
    Router::new()
        .route("/start", post(start_browser::<B>))
        .route("/execute_scenario", post(execute_scenario::<B>))
        .route("/stop_browser", post(stop_browser::<B>))
        .route("/sessions", get(list_sessions::<B>))
        .route("/health", get(health::<B>))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind and serve in a background task. Returns a handle carrying the
/// bound address (port 0 resolves here).
pub async fn start<B: BrowserDriver + Default>(
    config: ServerConfig,
    registry: Arc<SessionRegistry<B>>,
) -> std::io::Result<ServerHandle> {
    let router = build_router(AppState { registry });
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    info!(%addr, "scenario service listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle { addr, server })
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// Run until the serve task exits.
    pub async fn wait(self) {
        let _ = self.server.await;
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    browser_key: String,
    #[serde(flatten)]
    profile: LaunchProfile,
}

#[derive(Debug, Deserialize)]
struct ScenarioRequest {
    browser_key: String,
    #[serde(default)]
    page_index: usize,
    js_scenario: Vec<ScenarioStep>,
}

#[derive(Debug, Deserialize)]
struct StopQuery {
    browser_key: String,
}

async fn start_browser<B: BrowserDriver + Default>(
    State(state): State<AppState<B>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .registry
        .create(&req.browser_key, B::default(), &req.profile)
        .await?;

    Ok(Json(json!({
        "message": format!("browser with key `{}` started", req.browser_key)
    })))
}

async fn execute_scenario<B: BrowserDriver>(
    State(state): State<AppState<B>>,
    Json(req): Json<ScenarioRequest>,
) -> Response {
    match run_scenario(
        &state.registry,
        &req.browser_key,
        req.page_index,
        &req.js_scenario,
    )
    .await
    {
        Ok(report) if report.status == ScenarioStatus::Completed => {
            Json(json!({ "results": report.results })).into_response()
        }
        Ok(report) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": report.error, "results": report.results })),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn stop_browser<B: BrowserDriver>(
    State(state): State<AppState<B>>,
    Query(query): Query<StopQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.registry.destroy(&query.browser_key).await?;

    Ok(Json(json!({
        "message": format!("browser with key `{}` stopped", query.browser_key)
    })))
}

async fn list_sessions<B: BrowserDriver>(
    State(state): State<AppState<B>>,
) -> Json<serde_json::Value> {
    Json(json!({ "sessions": state.registry.snapshot().await }))
}

async fn health<B: BrowserDriver>(State(state): State<AppState<B>>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "sessions": state.registry.len().await }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrowser;
    use serde_json::Value;

    async fn spawn_mock_server() -> ServerHandle {
        let registry: Arc<SessionRegistry<MockBrowser>> = Arc::new(SessionRegistry::new());
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        start(config, registry).await.unwrap()
    }

    #[tokio::test]
    async fn start_scenario_stop_round_trip() {
        let handle = spawn_mock_server().await;
        let base = format!("http://{}", handle.addr);
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/start"))
            .json(&json!({"browser_key": "s1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .post(format!("{base}/execute_scenario"))
            .json(&json!({
                "browser_key": "s1",
                "page_index": 0,
                "js_scenario": [
                    {"navigate": {"url": "https://example.com"}},
                    {"get_screenshot_base64": {}}
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        let results = body["results"].as_array().unwrap();
        // navigate is empty, the screenshot is the only record
        assert_eq!(results.len(), 1);
        assert!(results[0]["value"].is_string());

        let resp = client
            .post(format!("{base}/stop_browser?browser_key=s1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .post(format!("{base}/stop_browser?browser_key=s1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("s1"));
    }

    #[tokio::test]
    async fn duplicate_start_is_a_bad_request() {
        let handle = spawn_mock_server().await;
        let base = format!("http://{}", handle.addr);
        let client = reqwest::Client::new();

        let first = client
            .post(format!("{base}/start"))
            .json(&json!({"browser_key": "dup"}))
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), 200);

        let second = client
            .post(format!("{base}/start"))
            .json(&json!({"browser_key": "dup"}))
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), 400);
    }

    #[tokio::test]
    async fn failing_scenario_returns_partial_output_and_evicts() {
        let handle = spawn_mock_server().await;
        let base = format!("http://{}", handle.addr);
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/start"))
            .json(&json!({"browser_key": "s2"}))
            .send()
            .await
            .unwrap();

        let resp = client
            .post(format!("{base}/execute_scenario"))
            .json(&json!({
                "browser_key": "s2",
                "js_scenario": [
                    {"get_screenshot_base64": {}},
                    {"click": {"selector": "#nope", "delay": 0, "timeout": 10}}
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("click:"));
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0]["value"].is_string());
        assert!(results[1]["error"].is_string());

        // the failing step destroyed the session
        let resp = client
            .post(format!("{base}/stop_browser?browser_key=s2"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn unknown_session_scenario_is_a_bad_request() {
        let handle = spawn_mock_server().await;
        let base = format!("http://{}", handle.addr);

        let resp = reqwest::Client::new()
            .post(format!("{base}/execute_scenario"))
            .json(&json!({"browser_key": "ghost", "js_scenario": []}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn health_and_sessions_report_registry_state() {
        let handle = spawn_mock_server().await;
        let base = format!("http://{}", handle.addr);
        let client = reqwest::Client::new();

        let body: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);

        client
            .post(format!("{base}/start"))
            .json(&json!({"browser_key": "listed"}))
            .send()
            .await
            .unwrap();

        let body: Value = client
            .get(format!("{base}/sessions"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["key"], "listed");
        assert_eq!(sessions[0]["pages"], 0);
    }
}
