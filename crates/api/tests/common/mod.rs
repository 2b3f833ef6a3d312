#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use labelflow_api::config::ServerConfig;
use labelflow_api::router::build_app_router;
use labelflow_api::state::AppState;
use labelflow_core::detector::{Detector, LazyAutoLabeler, RawDetection};
use labelflow_core::taxonomy::ClassTaxonomy;
use labelflow_core::testing::{StaticDetector, SyntheticBackend};

const BOUNDARY: &str = "labelflow-test-boundary";

/// A router over a private data directory, removed on drop.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _dir: TempDir,
}

/// Build a test `ServerConfig` rooted at `data_dir`.
pub fn test_config(data_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: data_dir.to_path_buf(),
        taxonomy_path: None,
        detector_command: None,
        default_confidence: 0.35,
        max_upload_bytes: 10 * 1024 * 1024,
        ffmpeg_bin: "ffmpeg".to_string(),
        ffprobe_bin: "ffprobe".to_string(),
    }
}

/// Detector vocabulary ordered differently from the taxonomy: "bus" is
/// native id 5 but taxonomy id 3.
pub fn test_detector() -> StaticDetector {
    StaticDetector::new(&[(0, "person"), (2, "car"), (5, "bus"), (9, "giraffe")]).with_detections(
        vec![
            RawDetection {
                class_id: 5,
                confidence: 0.9,
                bbox: [0.0, 0.0, 32.0, 24.0],
            },
            RawDetection {
                class_id: 0,
                confidence: 0.2,
                bbox: [10.0, 10.0, 20.0, 20.0],
            },
            RawDetection {
                class_id: 9,
                confidence: 0.95,
                bbox: [10.0, 10.0, 20.0, 20.0],
            },
        ],
    )
}

/// Full application over the synthetic media backend (10 fps, 30 frames,
/// 64x48) and [`test_detector`].
pub fn build_test_app() -> TestApp {
    build_test_app_with(|taxonomy| {
        LazyAutoLabeler::new(taxonomy, || {
            Ok(Box::new(test_detector()) as Box<dyn Detector>)
        })
    })
}

/// Full application with a custom detector adapter.
pub fn build_test_app_with<F>(labeler: F) -> TestApp
where
    F: FnOnce(Arc<ClassTaxonomy>) -> LazyAutoLabeler,
{
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    labelflow_core::storage::DataRoots::from_base(dir.path())
        .ensure()
        .unwrap();

    let taxonomy = Arc::new(ClassTaxonomy::default());
    let state = AppState::new(
        config.clone(),
        Arc::clone(&taxonomy),
        Arc::new(SyntheticBackend::default()),
        labeler(taxonomy),
    );
    let app = build_app_router(state.clone(), &config);

    TestApp {
        app,
        state,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::POST, uri, body).await
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::PUT, uri, body).await
}

async fn json_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a multipart upload with a `file` part and optional text parts.
pub async fn upload(
    app: &Router,
    filename: &str,
    content: &[u8],
    fields: &[(&str, &str)],
) -> Response<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/videos/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// Upload `My Clip.MP4` and extract one frame per second (3 frames).
///
/// Returns the video id.
pub async fn upload_and_extract(app: &Router) -> String {
    let response = upload(app, "My Clip.MP4", b"synthetic", &[]).await;
    assert_eq!(response.status(), 201);
    let video_id = body_json(response).await["data"]["video_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(
        app,
        &format!("/api/videos/{video_id}/extract"),
        serde_json::json!({ "frame_interval": 1 }),
    )
    .await;
    assert_eq!(response.status(), 200);
    video_id
}

// ---------------------------------------------------------------------------
// Body helpers
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
