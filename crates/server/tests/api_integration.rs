//! API integration tests against an in-process router.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;
use teradl_core::steps::target;
use teradl_core::testing::PageScript;
use teradl_server::api::WsMessage;

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["downloads"]["max_file_size_mb"], 100);
    assert_eq!(response.body["browser"]["executable_configured"], false);
    assert_eq!(response.body["flow"]["variant"], "stream_play");
    assert!(response.body["browser"].get("executable").is_none());
}

#[tokio::test]
async fn test_status_when_idle() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/run").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["running"], false);
    assert!(response.body["last_summary"].is_null());
}

#[tokio::test]
async fn test_start_run_processes_links() {
    let fixture = TestFixture::new();
    let links = fixture.links(&["https://a.example/1", "https://a.example/2"]);

    let response = fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let summary = fixture.wait_for_summary().await;
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["stopped_early"], false);
    assert!(fixture.output("vid1.mp4").exists());
    assert!(fixture.output("vid2.mp4").exists());
    assert_eq!(fixture.stats().closed(), 2);
}

#[tokio::test]
async fn test_start_run_with_missing_file() {
    let fixture = TestFixture::new();
    let missing = fixture.temp_dir.path().join("missing.txt");

    let response = fixture
        .post("/api/v1/run", json!({ "links_path": missing }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("Links file not found"));
    assert_eq!(fixture.stats().launched(), 0);
}

#[tokio::test]
async fn test_start_run_rejects_malformed_body() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/run", json!({ "path": "links.txt" }))
        .await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_second_start_conflicts() {
    // Play never appears, so the link spends a while probing.
    let fixture = TestFixture::with_config(|config| {
        config.flow.play_probe_attempts = 40;
        config.flow.play_probe_interval_ms = 10;
    });
    fixture
        .driver
        .push_script(PageScript::happy_path(1024).without_element(target::play_control()));
    let links = fixture.links(&["https://a.example/1"]);

    let first = fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    assert_eq!(first.status, StatusCode::ACCEPTED);

    while !fixture.controller.is_running() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second = fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);

    let summary = fixture.wait_for_summary().await;
    assert_eq!(summary["skipped"], 1);
}

#[tokio::test]
async fn test_stop_ends_run_after_current_link() {
    let fixture = TestFixture::new();
    let controller = fixture.controller.clone();
    fixture
        .driver
        .push_script(PageScript::happy_path(1024).on_goto(move || controller.request_stop()));
    let links = fixture.links(&["https://a.example/1", "https://a.example/2", "https://a.example/3"]);

    fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    let summary = fixture.wait_for_summary().await;

    assert_eq!(summary["stopped_early"], true);
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(fixture.stats().launched(), 1);
}

#[tokio::test]
async fn test_finish_run_waits_for_current_link() {
    // Play never appears, so each link spends a while probing.
    let fixture = TestFixture::with_config(|config| {
        config.flow.play_probe_attempts = 40;
        config.flow.play_probe_interval_ms = 10;
    });
    for _ in 0..3 {
        fixture
            .driver
            .push_script(PageScript::happy_path(1024).without_element(target::play_control()));
    }
    let links = fixture.links(&["https://a.example/1", "https://a.example/2", "https://a.example/3"]);

    let response = fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    while fixture.stats().launched() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    fixture.state.finish_run().await;

    assert!(!fixture.controller.is_running());
    let stats = fixture.stats();
    assert_eq!(stats.launched(), 1);
    assert_eq!(stats.closed(), 1);
    assert_eq!(stats.open_now(), 0);
    let summary = fixture.controller.last_summary().await.unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.attempted(), 1);
}

#[tokio::test]
async fn test_finish_run_without_run_returns() {
    let fixture = TestFixture::new();
    fixture.state.finish_run().await;
    assert!(!fixture.controller.is_running());
}

#[tokio::test]
async fn test_stop_and_skip_endpoints() {
    let fixture = TestFixture::new();

    let stop = fixture.post_empty("/api/v1/run/stop").await;
    assert_eq!(stop.status, StatusCode::OK);
    assert_eq!(stop.body["message"], "Stop requested");

    let skip = fixture.post_empty("/api/v1/run/skip").await;
    assert_eq!(skip.status, StatusCode::OK);

    let status = fixture.get("/api/v1/run").await;
    assert_eq!(status.body["stop_requested"], true);
    assert_eq!(status.body["skip_pending"], true);
}

#[tokio::test]
async fn test_run_logs_are_broadcast() {
    let fixture = TestFixture::new();
    let mut rx = fixture.broadcaster.subscribe();
    let links = fixture.links(&["https://a.example/1"]);

    fixture
        .post("/api/v1/run", json!({ "links_path": links }))
        .await;
    fixture.wait_for_summary().await;

    let mut messages = Vec::new();
    while let Ok(Ok(msg)) =
        tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
    {
        let finished = matches!(msg, WsMessage::RunFinished { .. });
        messages.push(msg);
        if finished {
            break;
        }
    }

    let log_lines: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            WsMessage::Log { event } => Some(event.message.clone()),
            _ => None,
        })
        .collect();
    assert!(log_lines.contains(&"Processing link 1 of 1".to_string()));
    assert!(log_lines.contains(&"Downloaded as vid1.mp4".to_string()));
    assert!(matches!(messages.last(), Some(WsMessage::RunFinished { .. })));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("teradl_run_active"));
    assert!(body.contains("teradl_http_requests_total"));
}
