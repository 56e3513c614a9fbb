//! Common test utilities for API testing with a mock browser.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by the scripted browser, so runs can be started, stopped and
//! skipped over HTTP without launching a real browser.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use teradl_core::{
    testing::{MockBrowserDriver, MockStats},
    Config, PipelineController,
};
use teradl_server::api::{create_router, WsBroadcaster};
use teradl_server::state::AppState;

/// Re-export fixtures for test convenience
pub use teradl_core::testing::fixtures;

/// Test fixture for API testing with a mock browser.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start_run() {
///     let fixture = TestFixture::new();
///     let links = fixture.links(&["https://a.example/1"]);
///
///     let response = fixture.post("/api/v1/run", json!({ "links_path": links })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock browser - queue page scripts per session
    pub driver: Arc<MockBrowserDriver>,
    pub controller: Arc<PipelineController>,
    pub broadcaster: WsBroadcaster,
    pub state: Arc<AppState>,
    /// Temporary directory for links, staging and output
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a fixture, adjusting the test config before wiring.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::test_config(temp_dir.path());
        adjust(&mut config);

        let driver = Arc::new(MockBrowserDriver::new(&config.downloads.staging_dir));
        let controller = Arc::new(PipelineController::new(driver.clone(), &config));
        let broadcaster = WsBroadcaster::default();

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&controller),
            broadcaster.clone(),
        ));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            driver,
            controller,
            broadcaster,
            state,
            temp_dir,
        }
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.driver.stats()
    }

    /// Write a links file into the temp dir.
    pub fn links(&self, lines: &[&str]) -> PathBuf {
        fixtures::links_file(self.temp_dir.path(), lines).expect("Failed to write links")
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("out").join(name)
    }

    /// Poll `GET /api/v1/run` until a finished run is reported.
    pub async fn wait_for_summary(&self) -> Value {
        for _ in 0..500 {
            let response = self.get("/api/v1/run").await;
            if !response.body["running"].as_bool().unwrap_or(true)
                && !response.body["last_summary"].is_null()
            {
                return response.body["last_summary"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Run did not finish in time");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
