//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router over a real SQLite store and mock step
//! executors, so the control surface can be exercised without external
//! infrastructure.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use convoy_core::{
    create_authenticator, load_config_from_str, testing::MockExecutor, BatchStore,
    ExecutorRegistry, PipelineManager, SqliteBatchStore,
};
use convoy_server::{create_router, AppState};

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// In-process server fixture with controllable executors.
pub struct TestFixture {
    pub router: Router,
    pub executor: MockExecutor,
    pub manager: Arc<PipelineManager>,
    pub api_key: Option<String>,
    _temp_dir: TempDir,
}

impl TestFixture {
    /// Fixture with a single mock-backed stage and no auth.
    pub fn new() -> Self {
        Self::with_config_toml(&Self::default_config_toml(), None)
    }

    /// Fixture whose pipeline is a manual gate followed by a mock stage.
    pub fn with_gate() -> Self {
        let toml = r#"
[auth]
method = "none"

[engine]
retry_backoff_ms = 10
gate_poll_interval_ms = 20
gate_ceiling_secs = 3600

[[stages]]
name = "await_confirmation"
manual_gate = true

[[stages]]
name = "provision"
executor = "mock"
"#;
        Self::with_config_toml(toml, None)
    }

    /// Fixture requiring the given API key.
    pub fn with_api_key(key: &str) -> Self {
        let toml = format!(
            r#"
[auth]
method = "api_key"
api_key = "{}"

[[stages]]
name = "provision"
executor = "mock"
"#,
            key
        );
        Self::with_config_toml(&toml, Some(key.to_string()))
    }

    /// Fixture with no stages configured at all.
    pub fn without_stages() -> Self {
        let toml = r#"
[auth]
method = "none"
"#;
        Self::with_config_toml(toml, None)
    }

    fn default_config_toml() -> String {
        // The registry is built directly over the mock below; the executors
        // section only feeds the sanitized /config response. Serial item
        // processing keeps pause tests deterministic.
        r#"
[auth]
method = "none"

[engine]
retry_backoff_ms = 10
gate_poll_interval_ms = 20

[[stages]]
name = "provision"
executor = "mock"
max_parallel = 1

[[executors]]
kind = "command"
name = "mock"
program = "true"
"#
        .to_string()
    }

    fn with_config_toml(toml: &str, api_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut config = load_config_from_str(toml).expect("config");
        config.database.path = temp_dir.path().join("convoy.db");

        let store: Arc<dyn BatchStore> = Arc::new(
            SqliteBatchStore::new(&config.database.path).expect("store"),
        );

        let executor = MockExecutor::new("mock");
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(executor.clone()));

        let manager = Arc::new(PipelineManager::new(
            &config.engine,
            &config.stages,
            store,
            Arc::new(registry),
        ));

        let authenticator = Arc::from(create_authenticator(&config.auth).expect("authenticator"));
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&manager),
        ));

        Self {
            router: create_router(state),
            executor,
            manager,
            api_key,
            _temp_dir: temp_dir,
        }
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request(Method::POST, path, None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None).await
    }

    /// Poll the status endpoint until the batch reaches `expected`.
    pub async fn wait_for_status(&self, batch_id: &str, expected: &str, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let path = format!("/api/v1/batches/{}/status", batch_id);
        while start.elapsed() < timeout {
            let response = self.get(&path).await;
            if response.body["status"] == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
