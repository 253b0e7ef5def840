//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use subscribe_api::catalog::PlanCatalog;
use subscribe_api::routes::create_router;
use subscribe_api::state::AppState;
use subscribe_common::types::{FailurePolicy, PipelineState};
use subscribe_notifier::{DocumentGenerator, ManualGenerator, Pipeline, PipelineConfig};
use subscribe_testing::{GatedGenerator, RecordingTransport};

// ============================================================
// Helpers
// ============================================================

struct TestApp {
    state: AppState,
    pipeline: Pipeline,
    transport: Arc<RecordingTransport>,
    _dir: tempfile::TempDir,
}

fn test_app(documents: Arc<dyn DocumentGenerator>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = Pipeline::start(
        PipelineConfig {
            failure_policy: FailurePolicy::LogOnly,
            document_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        },
        transport.clone(),
        documents,
    );
    let state = AppState::new(pipeline.coordinator(), PlanCatalog::seeded());

    TestApp {
        state,
        pipeline,
        transport,
        _dir: dir,
    }
}

fn subscribe_request(plan_id: i64, email: &str) -> Request<Body> {
    let body = serde_json::json!({
        "plan_id": plan_id,
        "subscriber": {
            "email": email,
            "first_name": "Jane",
            "last_name": "Doe"
        }
    });
    Request::builder()
        .method("POST")
        .uri("/api/subscriptions")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================
// Route tests
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));

    let response = create_router(app.state.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "subscribe-api");
    assert_eq!(json["pipeline"], "running");
    assert_eq!(json["outstanding_work"], 0);

    app.pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_list_plans() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));

    let response = create_router(app.state.clone())
        .oneshot(Request::builder().uri("/api/plans").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let plans = json.as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["name"], "Bronze Plan");
    assert_eq!(plans[2]["amount_cents"], 3000);

    app.pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_accepts_and_fulfills() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));

    let response = create_router(app.state.clone())
        .oneshot(subscribe_request(2, "jane@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["plan_id"], 2);

    let report = app.pipeline.shutdown().await.unwrap();
    assert_eq!(report.delivered, 2);
    let sent = app.transport.sent();
    assert!(sent.iter().all(|item| item.recipient == "jane@example.com"));
    assert!(sent.iter().any(|item| item.subject.contains("Silver Plan")));
}

#[tokio::test]
async fn test_same_subscriber_two_plans_gets_both_manuals() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));
    let subscriber_id = uuid::Uuid::new_v4();

    for plan_id in [1, 3] {
        let body = serde_json::json!({
            "plan_id": plan_id,
            "subscriber": {
                "id": subscriber_id,
                "email": "jane@example.com",
                "first_name": "Jane",
                "last_name": "Doe"
            }
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/subscriptions")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();
        let response = create_router(app.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["subscriber_id"], subscriber_id.to_string());
    }

    let report = app.pipeline.shutdown().await.unwrap();
    assert_eq!(report.delivered, 4);

    let manuals: Vec<String> = app
        .transport
        .sent()
        .iter()
        .flat_map(|item| item.attachments.values())
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect();
    assert_eq!(manuals.len(), 2);
    assert!(manuals.iter().any(|m| m.contains("(Bronze Plan - User Manual)")));
    assert!(manuals.iter().any(|m| m.contains("(Gold Plan - User Manual)")));
}

#[tokio::test]
async fn test_subscribe_unknown_plan() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));

    let response = create_router(app.state.clone())
        .oneshot(subscribe_request(42, "jane@example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let report = app.pipeline.shutdown().await.unwrap();
    assert_eq!(report.delivered, 0);
}

#[tokio::test]
async fn test_subscribe_invalid_email() {
    let app = test_app(Arc::new(ManualGenerator::new(Duration::ZERO)));

    let response = create_router(app.state.clone())
        .oneshot(subscribe_request(1, "not-an-email"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    app.pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_refused_while_draining() {
    let gate = Arc::new(GatedGenerator::default());
    let app = test_app(gate.clone());
    let router = create_router(app.state.clone());

    let response = router
        .clone()
        .oneshot(subscribe_request(1, "first@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let mut state = app.pipeline.state();
    let shutdown = tokio::spawn(app.pipeline.shutdown());
    state
        .wait_for(|s| *s == PipelineState::Draining)
        .await
        .unwrap();

    let response = router
        .oneshot(subscribe_request(1, "second@example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    gate.open(1);
    let report = shutdown.await.unwrap().unwrap();
    assert_eq!(report.delivered, 2);
    assert!(
        app.transport
            .sent()
            .iter()
            .all(|item| item.recipient == "first@example.com")
    );
}
