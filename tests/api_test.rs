//! HTTP API tests driven through the router without a socket.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{write_model_dir, Harness};
use inference_server::api::{router, AppState};
use inference_server::engine::Task;
use inference_server::health::HealthChecker;

fn app(h: &Harness) -> Router {
    router(AppState {
        manager: h.manager.clone(),
        health: Arc::new(HealthChecker::new()),
    })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// ============================================================================
// Health and listing
// ============================================================================

#[tokio::test]
async fn test_health_without_model() {
    let h = Harness::new();
    let (status, body) = send(app(&h), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["loaded"], false);
    assert!(body["model"].is_null());
}

#[tokio::test]
async fn test_models_empty() {
    let h = Harness::new();
    let (status, body) = send(app(&h), "GET", "/models", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"models": [], "count": 0}));
}

// ============================================================================
// Load
// ============================================================================

#[tokio::test]
async fn test_load_local_then_list() {
    let h = Harness::new();
    let path = h.model("sentiment");

    let (status, body) = send(
        app(&h),
        "POST",
        "/load",
        Some(json!({
            "model_type": "text-classification",
            "local_model_path": path.display().to_string()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["status"], "loaded");
    assert_eq!(body["model"]["source_kind"], "local");
    assert!(body["model"]["revision"].is_null());

    let (_, listed) = send(app(&h), "GET", "/models", None).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["models"][0]["type"], "text-classification");
    assert_eq!(listed["models"][0]["version"], "local");
    assert_eq!(listed["models"][0]["status"], "loaded");

    let (_, health) = send(app(&h), "GET", "/health", None).await;
    assert_eq!(health["loaded"], true);
}

#[tokio::test]
async fn test_load_hub_without_commit_uses_fallback_revision() {
    let h = Harness::new();
    write_model_dir(&h.hub.root, "org--name", None);

    let (status, body) = send(
        app(&h),
        "POST",
        "/load",
        Some(json!({"model_type": "text-classification", "huggingface_model_id": "org/name"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["model"]["task"], "text-classification");
    assert_eq!(body["model"]["revision"], "name");
}

#[tokio::test]
async fn test_load_without_model_type_is_400() {
    let h = Harness::new();
    let path = h.model("sentiment");
    let (status, body) = send(
        app(&h),
        "POST",
        "/load",
        Some(json!({"local_model_path": path.display().to_string()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("model_type"));
    assert!(!h.manager.is_loaded().await);
}

#[tokio::test]
async fn test_load_without_source_is_400() {
    let h = Harness::new();
    let (status, body) = send(
        app(&h),
        "POST",
        "/load",
        Some(json!({"model_type": "text-classification", "registered_model_name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("must be provided"));
}

#[tokio::test]
async fn test_load_failure_is_400_with_detail() {
    let h = Harness::new();
    let (status, body) = send(
        app(&h),
        "POST",
        "/load",
        Some(json!({"model_type": "text-classification", "local_model_path": "/definitely/not/here"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("/definitely/not/here"));
    assert!(!h.manager.is_loaded().await);
}

#[tokio::test]
async fn test_load_malformed_body_is_400() {
    let h = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/load")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(&h).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Inference
// ============================================================================

async fn loaded_harness() -> Harness {
    let h = Harness::new();
    let path = h.model("sentiment");
    h.manager
        .load_from_local(&path, Task::TextClassification, &Default::default())
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_infer_success() {
    let h = loaded_harness().await;
    let (status, body) = send(
        app(&h),
        "POST",
        "/infer/text-classification/sentiment",
        Some(json!({"texts": ["good", "bad"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["predictions"][0]["label"], "sentiment:good");
    assert_eq!(body["predictions"][1]["label"], "sentiment:bad");
}

#[tokio::test]
async fn test_infer_errors_are_in_body() {
    let h = loaded_harness().await;

    let (status, body) = send(
        app(&h),
        "POST",
        "/infer/text-classification/other",
        Some(json!({"texts": ["x"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("does not match"));

    let (_, body) = send(
        app(&h),
        "POST",
        "/infer/summarization/sentiment",
        Some(json!({"texts": ["x"]})),
    )
    .await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("Unsupported model_type"));

    let (_, body) = send(
        app(&h),
        "POST",
        "/infer/text-classification/sentiment",
        Some(json!({"texts": ["fine", "   "]})),
    )
    .await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("empty"));
    assert_eq!(h.factory.predict_count(), 0);
}

#[tokio::test]
async fn test_infer_nested_model_name() {
    let h = Harness::new();
    write_model_dir(&h.hub.root, "org--name", None);
    send(
        app(&h),
        "POST",
        "/load",
        Some(json!({"model_type": "text-classification", "huggingface_model_id": "org/name"})),
    )
    .await;

    let (_, body) = send(
        app(&h),
        "POST",
        "/infer/text-classification/org/name",
        Some(json!({"texts": ["x"], "top_k": 1})),
    )
    .await;
    assert_eq!(body["status"], "success", "body: {}", body);
    assert_eq!(body["predictions"][0][0]["label"], "org--name:x");
}

#[tokio::test]
async fn test_infer_without_model() {
    let h = Harness::new();
    let (status, body) = send(
        app(&h),
        "POST",
        "/infer/text-classification/sentiment",
        Some(json!({"texts": ["x"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("not loaded"));
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn test_stop_is_idempotent() {
    let h = loaded_harness().await;
    for _ in 0..2 {
        let (status, body) = send(app(&h), "POST", "/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "stopped"}));
    }
    assert!(!h.manager.is_loaded().await);
}
