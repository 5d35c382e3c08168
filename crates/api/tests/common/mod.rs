#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use opensees_api::config::{default_request_timeout_secs, ServerConfig};
use opensees_api::router::build_app_router;
use opensees_api::state::AppState;
use opensees_core::scripting::engine::EngineConfig;

pub const MULTIPART_BOUNDARY: &str = "opensees-test-boundary";

/// `sh` stands in for OpenSees: it runs the script file it is given, and the
/// version query prints an OpenSees-style banner.
pub fn sh_engine() -> EngineConfig {
    EngineConfig {
        program: PathBuf::from("sh"),
        version_args: vec!["-c".into(), "echo 'OpenSees 3.7.1'".into()],
        timeout: Duration::from_secs(5),
        kill_grace: Duration::from_millis(200),
        probe_timeout: Duration::from_secs(5),
        max_output_bytes: 64 * 1024,
    }
}

/// An engine binary that does not exist.
pub fn missing_engine() -> EngineConfig {
    EngineConfig {
        program: PathBuf::from("/nonexistent/bin/OpenSees"),
        ..sh_engine()
    }
}

/// Build a test `ServerConfig` around `engine`, with job workspaces created
/// under `workspace_root`.
///
/// Uses `http://localhost:3000` as CORS origin (matching the front-end dev
/// default).
pub fn test_config(engine: EngineConfig, workspace_root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: default_request_timeout_secs(&engine),
        max_upload_bytes: 64 * 1024,
        max_concurrent_jobs: 4,
        workspace_root: workspace_root.to_path_buf(),
        require_engine_probe: false,
        engine,
    }
}

/// A router plus the directory its job workspaces live in.
pub struct TestApp {
    pub router: Router,
    pub workspace_root: TempDir,
}

impl TestApp {
    /// Number of entries left under the workspace root.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.workspace_root.path())
            .expect("read workspace root")
            .count()
    }
}

/// Build the full application router with all middleware layers, the same
/// way `main.rs` does.
pub fn build_test_app(engine: EngineConfig) -> TestApp {
    let workspace_root = TempDir::new().expect("create workspace root");
    let config = test_config(engine, workspace_root.path());
    let router = build_app_router(AppState::new(&config), &config);
    TestApp {
        router,
        workspace_root,
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_raw(app: Router, uri: &str, content_type: &str, body: String) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response {
    post_raw(app, uri, "application/json", body.to_string()).await
}

/// POST a single-part multipart form with the given field name.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    field: &str,
    filename: Option<&str>,
    content: &str,
) -> Response {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: {disposition}\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         {content}\r\n\
         --{MULTIPART_BOUNDARY}--\r\n"
    );
    post_raw(
        app,
        uri,
        &format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        body,
    )
    .await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
