#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use runbook_api::build_router;
use runbook_api::config::ServerConfig;
use runbook_api::state::AppState;
use runbook_core::markup;
use runbook_core::mode::{ExecutionMode, ModeController};
use runbook_core::registry::ExecutableRegistry;
use runbook_core::session::SessionManager;
use runbook_events::StreamRegistry;

/// A test server built around a throwaway runbook file.
pub struct TestApp {
    pub router: Router,
    pub config: Arc<ServerConfig>,
    _dir: tempfile::TempDir,
}

/// Build the full application router, with the same middleware stack
/// production uses, serving the given runbook document.
pub fn build_test_app(doc: &str, mode: ExecutionMode) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let runbook_path = dir.path().join("runbook.mdx");
    std::fs::write(&runbook_path, doc).expect("write runbook");

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        runbook_path: runbook_path.clone(),
        mode,
        output_dir: dir.path().join("output"),
        workspace_dir: None,
        cors_origins: vec!["http://localhost:5173".to_string()],
        exec_timeout: Duration::from_secs(30),
    };

    let controller = match mode {
        ExecutionMode::LiveReload => ModeController::new(mode, &runbook_path, None),
        ExecutionMode::RegistryValidated | ExecutionMode::WatchNoReload => {
            let extracted = markup::extract_from_file(&runbook_path).expect("extract blocks");
            let registry = ExecutableRegistry::build(extracted, dir.path());
            ModeController::new(mode, &runbook_path, Some(Arc::new(registry)))
        }
    }
    .expect("mode controller");

    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        session: Arc::new(SessionManager::new()),
        controller: Arc::new(controller),
        streams: Arc::new(StreamRegistry::new()),
        watch: None,
    };

    TestApp {
        router: build_router(state),
        config,
        _dir: dir,
    }
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    request(app, "GET", uri, None, None).await
}

pub async fn get_auth(app: &TestApp, uri: &str, token: &str) -> Response<Body> {
    request(app, "GET", uri, Some(token), None).await
}

pub async fn post(app: &TestApp, uri: &str, token: Option<&str>) -> Response<Body> {
    request(app, "POST", uri, token, None).await
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    request(app, "POST", uri, token, Some(body)).await
}

pub async fn delete(app: &TestApp, uri: &str, token: Option<&str>) -> Response<Body> {
    request(app, "DELETE", uri, token, None).await
}

async fn request(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("router response")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is valid JSON")
}

/// Collect an SSE body and parse each `data:` line as JSON. Only valid
/// for streams that terminate (a finished execution's replay).
pub async fn sse_events(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect SSE body")
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).expect("SSE body is UTF-8");
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).expect("SSE data is valid JSON"))
        .collect()
}

/// Create the session and return its bearer token.
pub async fn create_session(app: &TestApp) -> String {
    let response = post(app, "/api/session", None).await;
    assert!(
        response.status().is_success(),
        "session creation failed: {}",
        response.status()
    );
    let json = body_json(response).await;
    json["token"]
        .as_str()
        .expect("token in response")
        .to_string()
}
