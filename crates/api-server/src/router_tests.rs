use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use income_core::{
    InMemoryRegionStore, MlPredictor, PredictionPolicy, PredictionResult, RegionId,
};
use ml_client::TableMlPredictor;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

/// Oracle that never answers inside the test timeout
struct StalledPredictor;

#[async_trait]
impl MlPredictor for StalledPredictor {
    async fn predict(&self, _region: &RegionId) -> Result<PredictionResult, PredictionError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(PredictionError::Upstream("unreachable".into()))
    }

    fn backend_name(&self) -> &'static str {
        "stalled"
    }

    async fn health(&self) -> Result<bool, PredictionError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(true)
    }
}

fn app_with(ml: Arc<dyn MlPredictor>, timeout: Duration) -> Router {
    let orchestrator = PredictionOrchestrator::new(
        Arc::new(InMemoryRegionStore::builtin().unwrap()),
        ml,
        PredictionPolicy::default(),
        timeout,
    );
    build_router(
        AppState {
            orchestrator: Arc::new(orchestrator),
        },
        &[],
    )
}

fn app() -> Router {
    app_with(Arc::new(TableMlPredictor::builtin().unwrap()), Duration::from_secs(2))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_statistical_prediction() {
    let (status, _, body) = send(
        app(),
        post_json("/api/predict/statistical", json!({"regionId": "90210"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["methodology"], "statistical");
    assert_eq!(data["predictedIncome"], 132_449);
    assert_eq!(data["regionId"], "90210");
    assert_eq!(data["modelVersion"], "statistical/income-policy-v1");
    assert_eq!(data["components"]["baseIncome"], 97_200);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_ml_prediction_by_path() {
    let (status, _, body) = send(app(), get("/api/predict/ml/90210")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["methodology"], "ml");
    assert_eq!(body["data"]["predictedIncome"], 128_500);
    assert_eq!(body["data"]["modelDetails"]["trainingSize"], 48_210);
}

#[tokio::test]
async fn test_hybrid_prediction() {
    let (status, _, body) = send(
        app(),
        post_json("/api/predict/hybrid", json!({"regionId": "60601"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["methodology"], "hybrid");
    let weights = &data["components"]["weightingStrategy"];
    let sum = weights["ml"].as_f64().unwrap() + weights["statistical"].as_f64().unwrap();
    assert!((sum - 1.0).abs() < 1e-9);
    assert!(data["confidence"].as_f64().unwrap() <= 0.99);
}

#[tokio::test]
async fn test_compare_methods() {
    let (status, _, body) = send(
        app(),
        post_json("/api/compare-methods", json!({"regionId": "10001"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["regionId"], "10001");
    assert_eq!(data["statistical"]["methodology"], "statistical");
    assert_eq!(data["ml"]["methodology"], "ml");
    assert_eq!(data["hybrid"]["methodology"], "hybrid");

    let stats = &data["statistics"];
    assert!(["high", "medium", "low"].contains(&stats["agreement"].as_str().unwrap()));
    assert!(["statistical", "ml", "hybrid"].contains(&stats["recommendedMethod"].as_str().unwrap()));
    assert_eq!(
        stats["spread"].as_i64().unwrap(),
        stats["max"].as_i64().unwrap() - stats["min"].as_i64().unwrap()
    );
    assert_eq!(data["charts"]["predictions"].as_array().unwrap().len(), 3);
    assert_eq!(data["charts"]["deviations"][0]["method"], "statistical");
}

#[tokio::test]
async fn test_get_comparison_matches_post() {
    let (_, _, by_path) = send(app(), get("/api/compare-methods/98101")).await;
    let (_, _, by_body) = send(
        app(),
        post_json("/api/compare-methods", json!({"regionId": "98101"})),
    )
    .await;

    assert_eq!(by_path["data"]["statistics"]["mean"], by_body["data"]["statistics"]["mean"]);
    assert_eq!(
        by_path["data"]["statistics"]["recommendedMethod"],
        by_body["data"]["statistics"]["recommendedMethod"]
    );
}

#[tokio::test]
async fn test_malformed_region_id() {
    let (status, _, body) = send(
        app(),
        post_json("/api/predict/statistical", json!({"regionId": "ABCDE"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "validation");
    assert_eq!(body["error"]["field"], "regionId");
}

#[tokio::test]
async fn test_unknown_region() {
    let (status, _, body) = send(app(), get("/api/compare-methods/99999")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(body["error"].get("field").is_none());
}

#[tokio::test]
async fn test_malformed_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict/hybrid")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"regionId\": "))
        .unwrap();
    let (status, _, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
    assert_eq!(body["error"]["field"], "body");
}

#[tokio::test]
async fn test_missing_region_field() {
    let (status, _, body) = send(app(), post_json("/api/compare-methods", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "body");
}

#[tokio::test]
async fn test_oracle_timeout_is_bad_gateway() {
    let app = app_with(Arc::new(StalledPredictor), Duration::from_millis(50));
    let (status, _, body) = send(
        app,
        post_json("/api/compare-methods", json!({"regionId": "90210"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "timeout");
}

#[tokio::test]
async fn test_statistical_does_not_wait_on_oracle() {
    let app = app_with(Arc::new(StalledPredictor), Duration::from_millis(50));
    let (status, _, _) = send(app, get("/api/predict/statistical/90210")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_batch_comparison() {
    let (status, _, body) = send(
        app(),
        post_json(
            "/api/batch/compare-methods",
            json!({"regionIds": ["90210", "00000", "10451"]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["requested"], 3);
    assert_eq!(data["succeeded"], 2);
    assert_eq!(data["failed"], 1);

    let results = data["results"].as_array().unwrap();
    assert_eq!(results[0]["regionId"], "90210");
    assert!(results[0]["report"].is_object());
    assert_eq!(results[1]["error"]["kind"], "not_found");
    assert!(results[1].get("report").is_none());
    assert_eq!(results[2]["report"]["jurisdiction"], "NY");
}

#[tokio::test]
async fn test_batch_too_large() {
    let ids: Vec<String> = (0..51).map(|i| format!("{:05}", i)).collect();
    let (status, _, body) = send(
        app(),
        post_json("/api/batch/compare-methods", json!({ "regionIds": ids })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "regionIds");
}

#[tokio::test]
async fn test_regions() {
    let (status, _, body) = send(app(), get("/api/regions")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 11);
    assert_eq!(body["data"]["regionIds"][0], "02108");
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(app(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["policyVersion"], "income-policy-v1");
    assert_eq!(body["data"]["mlBackend"], "table");
    assert_eq!(body["data"]["mlReachable"], true);
    assert_eq!(body["data"]["mlTimeoutMs"], 2000);
}

#[tokio::test]
async fn test_health_degraded_when_oracle_stalls() {
    let app = app_with(Arc::new(StalledPredictor), Duration::from_millis(50));
    let (status, _, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["mlBackend"], "stalled");
    assert_eq!(body["data"]["mlReachable"], false);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "client-abc-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(app(), request).await;
    assert_eq!(headers["x-request-id"], "client-abc-123");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let (_, headers, _) = send(app(), get("/api/regions")).await;
    let id = headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_openapi_document() {
    let (status, _, body) = send(app(), get("/api-docs/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/compare-methods"));
    assert!(paths.contains_key("/api/predict/hybrid"));
    assert!(paths.contains_key("/api/batch/compare-methods"));
}

#[test]
fn test_error_status_mapping() {
    let cases = [
        (PredictionError::validation("regionId", "bad"), StatusCode::BAD_REQUEST),
        (PredictionError::NotFound("12345".into()), StatusCode::NOT_FOUND),
        (PredictionError::Upstream("down".into()), StatusCode::BAD_GATEWAY),
        (PredictionError::Timeout(Duration::from_secs(1)), StatusCode::BAD_GATEWAY),
        (
            PredictionError::InvariantViolation("mismatch".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, expected) in cases {
        assert_eq!(AppError::from(err).status(), expected);
    }
}
