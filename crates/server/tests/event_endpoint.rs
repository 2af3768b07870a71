//! Router tests for the notification endpoint, with mock collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use finpipe_core::{
    testing::{fixtures, MockObjectStore, MockTokenProvider, MockToolRunner, StoreOp},
    Config, PipelineCoordinator, RunOrchestrator,
};
use finpipe_server::{api::create_router, state::AppState};

/// In-process server with controllable mocks.
struct TestFixture {
    router: Router,
    store: MockObjectStore,
    tokens: MockTokenProvider,
    _work: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let work = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::test_config(work.path());
        tweak(&mut config);

        let store = MockObjectStore::new();
        let tokens = MockTokenProvider::default();
        let pipeline = Arc::new(PipelineCoordinator::new(
            config.pipeline.clone(),
            MockToolRunner::new(),
        ));
        let orchestrator = Arc::new(RunOrchestrator::new(
            &config,
            Arc::new(store.clone()),
            Arc::new(tokens.clone()),
            pipeline,
        ));

        let router = create_router(Arc::new(AppState::new(config, orchestrator)));

        Self {
            router,
            store,
            tokens,
            _work: work,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn post_event(&self, ce_type: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header("ce-type", ce_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }
}

const FINALIZED: &str = "google.cloud.storage.object.v1.finalized";

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let (status, body) = fixture.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_trigger_runs_and_acks() {
    let fixture = TestFixture::new();
    fixtures::seed_inputs(&fixture.store, fixtures::INPUT_BUCKET, "in/", "demo").await;

    let (status, body) = fixture
        .post_event(
            FINALIZED,
            fixtures::notification_body(fixtures::INPUT_BUCKET, "in/demo/right.csv"),
        )
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert!(fixture
        .store
        .object(fixtures::OUTPUT_BUCKET, "out/demo/_SUCCESS.json")
        .await
        .is_some());
}

#[tokio::test]
async fn test_irrelevant_and_malformed_events_are_acked() {
    let fixture = TestFixture::new();

    let (status, _) = fixture
        .post_event(
            "google.cloud.storage.object.v1.deleted",
            fixtures::notification_body(fixtures::INPUT_BUCKET, "in/demo/right.csv"),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = fixture.post_event(FINALIZED, b"{not json".to_vec()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = fixture
        .post_event(
            FINALIZED,
            fixtures::notification_body(fixtures::INPUT_BUCKET, "in/demo/left.csv"),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(fixture.store.calls().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_is_acked_without_work() {
    let fixture = TestFixture::new();
    fixture
        .store
        .put_object(fixtures::OUTPUT_BUCKET, "out/demo/_SUCCESS.json", "{}")
        .await;

    let (status, _) = fixture
        .post_event(
            FINALIZED,
            fixtures::notification_body(fixtures::INPUT_BUCKET, "in/demo/right.csv"),
        )
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(fixture.store.calls_for(StoreOp::Download).await.is_empty());
}

#[tokio::test]
async fn test_infrastructure_failure_asks_for_redelivery() {
    let fixture = TestFixture::new();
    fixtures::seed_inputs(&fixture.store, fixtures::INPUT_BUCKET, "in/", "demo").await;
    fixture.tokens.set_failing(true);

    let (status, body) = fixture
        .post_event(
            FINALIZED,
            fixtures::notification_body(fixtures::INPUT_BUCKET, "in/demo/right.csv"),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_oversized_payload_is_rejected() {
    let fixture = TestFixture::with_config(|c| c.server.max_event_bytes = 64);
    let body = serde_json::json!({
        "bucket": fixtures::INPUT_BUCKET,
        "name": format!("in/{}/right.csv", "x".repeat(200)),
    })
    .to_string()
    .into_bytes();

    let (status, _) = fixture.post_event(FINALIZED, body).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let fixture = TestFixture::new();
    let (status, _) = fixture.get("/").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_config_hides_access_token() {
    let fixture =
        TestFixture::with_config(|c| c.token.access_token = Some("secret-token".to_string()));
    let (status, body) = fixture.get("/config").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!String::from_utf8_lossy(&body).contains("secret-token"));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["token"]["access_token_configured"], true);
    assert_eq!(json["storage"]["output_bucket"], fixtures::OUTPUT_BUCKET);
}

#[tokio::test]
async fn test_metrics_count_event_outcomes() {
    let fixture = TestFixture::new();
    fixture.post_event(FINALIZED, b"not json".to_vec()).await;

    let (status, body) = fixture.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("finpipe_events_total{outcome=\"contract_error\"}"));
    assert!(text.contains("finpipe_http_requests_total"));
}
