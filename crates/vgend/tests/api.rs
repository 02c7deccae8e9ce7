//! Router tests against scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vgen_core::fakes::{clean_report, planning_markdown, ScriptedGenerator, ScriptedVerifier};
use vgen_core::{ArtifactStore, Orchestrator, Pipeline, PipelineConfig, PromptKind, RunRegistry};
use vgend::{create_router, AppState};

fn app(dir: &TempDir, config: PipelineConfig) -> Router {
    let generator = ScriptedGenerator::new()
        .with_default(
            PromptKind::Planning,
            planning_markdown(&[("Register inputs", "latch a and b"), ("Divide", "shift")]),
        )
        .with_default(
            PromptKind::Subtask,
            "```verilog\nmodule part(input a, output y);\n  assign y = a;\nendmodule\n```",
        )
        .with_default(PromptKind::Testbench, "module tb; endmodule");
    let config = PipelineConfig {
        workspace: dir.path().join("runs"),
        stream_poll_interval_ms: 10,
        ..config
    };
    let store = ArtifactStore::new(&config.workspace).unwrap();
    let orchestrator = Orchestrator::new(
        Pipeline::new(
            Arc::new(generator),
            Arc::new(ScriptedVerifier::always(clean_report())),
            config,
        ),
        store,
        Arc::new(RunRegistry::new()),
    );
    create_router(AppState::new(orchestrator))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn submit(app: &Router, body: Value) -> String {
    let (status, body) = send_json(app, "POST", "/run", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["run_id"].as_str().unwrap().to_string()
}

/// Poll `GET /run/:id` until `done` holds for the snapshot.
async fn wait_for(app: &Router, run_id: &str, done: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..500 {
        let (status, run) = send_json(app, "GET", &format!("/run/{run_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if done(&run) {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not reach the expected state");
}

fn finished(run: &Value) -> bool {
    !matches!(
        run["status"].as_str(),
        Some("starting" | "running" | "waiting_for_input")
    )
}

#[tokio::test]
async fn health_reports_version() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());

    let (status, body) = send_json(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], vgen_core::VERSION);
    assert_eq!(body["runs"], 0);
}

#[tokio::test]
async fn submitted_planning_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());

    let (status, body) = send_json(
        &app,
        "POST",
        "/run",
        Some(json!({"problem": "8-bit counter", "run_type": "planning"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "starting");
    let run_id = body["run_id"].as_str().unwrap().to_string();
    assert_eq!(body["message"], format!("Run {run_id} started"));

    let run = wait_for(&app, &run_id, finished).await;
    assert_eq!(run["status"], "completed", "{run}");
    assert_eq!(run["problem"], "8-bit counter");
    assert_eq!(run["run_type"], "planning");
    assert!(dir
        .path()
        .join("runs")
        .join(&run_id)
        .join("high_level_planning_task.md")
        .exists());
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());

    let (status, body) = send_json(&app, "GET", "/run/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&app, "GET", "/run/nope/stream", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/run/nope/input", Some(json!({"input": ""}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn input_for_run_not_waiting_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());
    let run_id = submit(&app, json!({"run_type": "planning"})).await;
    let before = wait_for(&app, &run_id, finished).await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/run/{run_id}/input"),
        Some(json!({"input": "make it faster"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    let (_, after) = send_json(&app, "GET", &format!("/run/{run_id}"), None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn review_gate_resumes_on_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        review_planning: true,
        ..PipelineConfig::default()
    };
    let app = app(&dir, config);
    let run_id = submit(&app, json!({"run_type": "planning"})).await;

    wait_for(&app, &run_id, |run| run["waiting_for_input"] == true).await;
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/run/{run_id}/input"),
        Some(json!({"input": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Input provided successfully");

    let run = wait_for(&app, &run_id, finished).await;
    assert_eq!(run["status"], "completed", "{run}");
    assert_eq!(run["waiting_for_input"], false);
}

#[tokio::test]
async fn bad_run_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());

    let (status, body) =
        send_json(&app, "POST", "/run", Some(json!({"run_type": "synthesis"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("synthesis"));
    let (_, runs) = send_json(&app, "GET", "/runs", None).await;
    assert_eq!(runs["runs"], json!([]));
}

#[tokio::test]
async fn missing_source_run_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());

    let (status, _) = send_json(
        &app,
        "POST",
        "/run",
        Some(json!({"run_type": "iverilog", "source_run": "run-that-never-was"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn source_run_path_outside_workspace_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());
    let outside = dir.path().to_string_lossy().into_owned();

    for source in ["../x", "..", outside.as_str()] {
        let (status, body) = send_json(
            &app,
            "POST",
            "/run",
            Some(json!({"run_type": "iverilog", "source_run": source})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{source}: {body}");
        assert!(body["error"].as_str().unwrap().contains("invalid run id"));
    }
    let (_, runs) = send_json(&app, "GET", "/runs", None).await;
    assert_eq!(runs["runs"], json!([]));
}

#[tokio::test]
async fn list_runs_returns_ids_and_details() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());
    let first = submit(&app, json!({"run_type": "planning"})).await;
    let second = submit(&app, json!({"run_type": "planning"})).await;
    wait_for(&app, &first, finished).await;
    wait_for(&app, &second, finished).await;

    let (status, body) = send_json(&app, "GET", "/runs", None).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["runs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.as_str()) && ids.contains(&second.as_str()));
    assert_eq!(body["details"][&first]["run_id"], first);
    assert_eq!(body["details"][&second]["status"], "completed");
}

#[tokio::test]
async fn stream_of_finished_run_replays_events_then_terminal_marker() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());
    let run_id = submit(&app, json!({"run_type": "planning"})).await;
    let run = wait_for(&app, &run_id, finished).await;

    let (status, bytes) = send(&app, "GET", &format!("/run/{run_id}/stream"), None).await;
    assert_eq!(status, StatusCode::OK);

    let frames: Vec<Value> = String::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();
    let events = run["outputs"].as_array().unwrap();
    assert_eq!(frames.len(), events.len() + 1);
    for (frame, event) in frames.iter().zip(events) {
        assert_eq!(frame["seq"], event["seq"]);
        assert_eq!(frame["message"], event["message"]);
    }
    assert_eq!(
        frames.last().unwrap(),
        &json!({"status": "completed", "message": "Run complete"})
    );
}

#[tokio::test]
async fn deleted_run_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, PipelineConfig::default());
    let run_id = submit(&app, json!({"run_type": "planning"})).await;
    wait_for(&app, &run_id, finished).await;

    let (status, body) = send_json(&app, "DELETE", &format!("/run/{run_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "removed");

    let (status, _) = send(&app, "GET", &format!("/run/{run_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/run/{run_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
