mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use runbook_core::mode::ExecutionMode;

const DOC: &str = r#"# Demo runbook

<Check id="greet" command="echo hello from greet" />

<Command id="slow" command="sleep 30" />
"#;

/// Look up the registry-issued id for a component.
async fn executable_id(app: &common::TestApp, component_id: &str) -> String {
    let response = common::get(app, "/api/runbook/executables").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    json["executables"]
        .as_array()
        .expect("executables array")
        .iter()
        .find(|e| e["component_id"] == component_id)
        .unwrap_or_else(|| panic!("no executable for component {component_id}"))["id"]
        .as_str()
        .expect("id")
        .to_string()
}

#[tokio::test]
async fn registry_lists_declared_executables() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);

    let response = common::get(&app, "/api/runbook/executables").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;

    assert_eq!(json["mode"], "registry");
    let executables = json["executables"].as_array().expect("executables array");
    assert_eq!(executables.len(), 2);
    assert_eq!(executables[0]["component_id"], "greet");
    assert_eq!(executables[0]["component_type"], "check");
    // Metadata only; the script itself stays server-side.
    assert!(!json.to_string().contains("echo hello"));
}

#[tokio::test]
async fn submit_requires_auth() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let id = executable_id(&app, "greet").await;

    let response =
        common::post_json(&app, "/api/exec", None, json!({ "executable_id": id })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submit_rejects_ambiguous_targets() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;

    let response = common::post_json(
        &app,
        "/api/exec",
        Some(&token),
        json!({ "executable_id": "abc", "component_id": "greet" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = common::post_json(&app, "/api/exec", Some(&token), json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_rejects_unknown_executable() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;

    let response = common::post_json(
        &app,
        "/api/exec",
        Some(&token),
        json!({ "executable_id": "0000000000000000" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = common::body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn registry_mode_refuses_component_targets() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;

    let response = common::post_json(
        &app,
        "/api/exec",
        Some(&token),
        json!({ "component_id": "greet" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["code"], "TARGET_REJECTED");
}

#[tokio::test]
async fn live_mode_resolves_component_targets() {
    let app = common::build_test_app(DOC, ExecutionMode::LiveReload);
    let token = common::create_session(&app).await;

    let response = common::post_json(
        &app,
        "/api/exec",
        Some(&token),
        json!({ "component_id": "greet" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert!(json["execution_id"].as_str().is_some());

    // Registry ids have no meaning in live mode.
    let response = common::post_json(
        &app,
        "/api/exec",
        Some(&token),
        json!({ "executable_id": "0000000000000000" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_replays_a_finished_execution() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;
    let id = executable_id(&app, "greet").await;

    let response =
        common::post_json(&app, "/api/exec", Some(&token), json!({ "executable_id": id })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let execution_id = common::body_json(response).await["execution_id"]
        .as_str()
        .expect("execution_id")
        .to_string();

    // Give the echo plenty of time to finish; a finished stream replays
    // its history and closes, so collecting the body terminates.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let response =
        common::get_auth(&app, &format!("/api/exec/{execution_id}/stream"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = common::sse_events(response).await;
    assert!(events
        .iter()
        .any(|e| e["type"] == "stdout" && e["line"] == "hello from greet"));
    let result = events
        .iter()
        .find(|e| e["type"] == "result")
        .expect("result event");
    assert_eq!(result["outcome"], "success");
    assert_eq!(result["exit_code"], 0);
    assert_eq!(result["cancelled"], false);
}

#[tokio::test]
async fn stream_of_unknown_execution_is_404() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;

    let response = common::get_auth(
        &app,
        "/api/exec/00000000-0000-0000-0000-000000000000/stream",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_stops_a_running_execution() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;
    let id = executable_id(&app, "slow").await;

    let response =
        common::post_json(&app, "/api/exec", Some(&token), json!({ "executable_id": id })).await;
    let execution_id = common::body_json(response).await["execution_id"]
        .as_str()
        .expect("execution_id")
        .to_string();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let response = common::post(
        &app,
        &format!("/api/exec/{execution_id}/cancel"),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let response =
        common::get_auth(&app, &format!("/api/exec/{execution_id}/stream"), &token).await;
    let events = common::sse_events(response).await;
    let result = events
        .iter()
        .find(|e| e["type"] == "result")
        .expect("result event");
    assert_eq!(result["outcome"], "fail");
    assert_eq!(result["cancelled"], true);
}

#[tokio::test]
async fn cancel_of_unknown_execution_is_404() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);
    let token = common::create_session(&app).await;

    let response = common::post(
        &app,
        "/api/exec/00000000-0000-0000-0000-000000000000/cancel",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn watch_is_unavailable_in_registry_mode() {
    let app = common::build_test_app(DOC, ExecutionMode::RegistryValidated);

    let response = common::get(&app, "/api/watch").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
