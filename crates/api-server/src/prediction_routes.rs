use axum::{
    extract::{FromRequest, Path, State},
    routing::{get, post},
    Json, Router,
};
use income_core::{BatchComparisonEntry, ComparisonReport, Methodology, PredictionResult};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

/// JSON body extractor whose rejections use the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// ─── Request / response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequest {
    /// Five-digit region code, e.g. "90210"
    pub region_id: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompareRequest {
    pub region_ids: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompareResponse {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchComparisonEntry>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionsResponse {
    pub count: usize,
    pub region_ids: Vec<String>,
}

// ─── Router ─────────────────────────────────────────────────────────────────

pub fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict/statistical", post(predict_statistical))
        .route("/api/predict/ml", post(predict_ml))
        .route("/api/predict/hybrid", post(predict_hybrid))
        .route("/api/predict/statistical/:region_id", get(get_statistical))
        .route("/api/predict/ml/:region_id", get(get_ml))
        .route("/api/predict/hybrid/:region_id", get(get_hybrid))
        .route("/api/compare-methods", post(compare_methods))
        .route("/api/compare-methods/:region_id", get(get_comparison))
        .route("/api/batch/compare-methods", post(compare_batch))
        .route("/api/regions", get(list_regions))
}

async fn predict(
    state: &AppState,
    method: Methodology,
    region_id: &str,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    let orchestrator = &state.orchestrator;
    let result = match method {
        Methodology::Statistical => orchestrator.predict_statistical(region_id).await?,
        Methodology::Ml => orchestrator.predict_ml(region_id).await?,
        Methodology::Hybrid => orchestrator.predict_hybrid(region_id).await?,
    };
    Ok(Json(ApiResponse::success(result)))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/api/predict/statistical",
    request_body = RegionRequest,
    responses(
        (status = 200, description = "Formula-based income estimate with factor breakdown"),
        (status = 400, description = "Malformed region id or body"),
        (status = 404, description = "Region not in the reference data")
    ),
    tag = "Predictions"
)]
pub async fn predict_statistical(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegionRequest>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Statistical, &req.region_id).await
}

#[utoipa::path(
    post,
    path = "/api/predict/ml",
    request_body = RegionRequest,
    responses(
        (status = 200, description = "ML oracle estimate with feature snapshot and model details"),
        (status = 400, description = "Malformed region id or body"),
        (status = 404, description = "Region unknown to the oracle"),
        (status = 502, description = "Oracle failed or timed out")
    ),
    tag = "Predictions"
)]
pub async fn predict_ml(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegionRequest>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Ml, &req.region_id).await
}

#[utoipa::path(
    post,
    path = "/api/predict/hybrid",
    request_body = RegionRequest,
    responses(
        (status = 200, description = "Confidence-weighted blend of statistical and ML estimates"),
        (status = 400, description = "Malformed region id or body"),
        (status = 404, description = "Region not found"),
        (status = 502, description = "Oracle failed or timed out")
    ),
    tag = "Predictions"
)]
pub async fn predict_hybrid(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegionRequest>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Hybrid, &req.region_id).await
}

#[utoipa::path(
    get,
    path = "/api/predict/statistical/{region_id}",
    params(("region_id" = String, Path, description = "Five-digit region code")),
    responses((status = 200, description = "Formula-based income estimate")),
    tag = "Predictions"
)]
pub async fn get_statistical(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Statistical, &region_id).await
}

#[utoipa::path(
    get,
    path = "/api/predict/ml/{region_id}",
    params(("region_id" = String, Path, description = "Five-digit region code")),
    responses((status = 200, description = "ML oracle estimate")),
    tag = "Predictions"
)]
pub async fn get_ml(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Ml, &region_id).await
}

#[utoipa::path(
    get,
    path = "/api/predict/hybrid/{region_id}",
    params(("region_id" = String, Path, description = "Five-digit region code")),
    responses((status = 200, description = "Hybrid estimate")),
    tag = "Predictions"
)]
pub async fn get_hybrid(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    predict(&state, Methodology::Hybrid, &region_id).await
}

#[utoipa::path(
    post,
    path = "/api/compare-methods",
    request_body = RegionRequest,
    responses(
        (status = 200, description = "All three estimates with dispersion statistics, agreement and recommendation"),
        (status = 400, description = "Malformed region id or body"),
        (status = 404, description = "Region not found"),
        (status = 502, description = "Oracle failed or timed out")
    ),
    tag = "Comparison"
)]
pub async fn compare_methods(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegionRequest>,
) -> Result<Json<ApiResponse<ComparisonReport>>, AppError> {
    let report = state.orchestrator.compare_methods(&req.region_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/compare-methods/{region_id}",
    params(("region_id" = String, Path, description = "Five-digit region code")),
    responses((status = 200, description = "Cross-method comparison report")),
    tag = "Comparison"
)]
pub async fn get_comparison(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
) -> Result<Json<ApiResponse<ComparisonReport>>, AppError> {
    let report = state.orchestrator.compare_methods(&region_id).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    post,
    path = "/api/batch/compare-methods",
    request_body = BatchCompareRequest,
    responses(
        (status = 200, description = "One entry per requested region, each holding a report or an error"),
        (status = 400, description = "Empty or oversized batch")
    ),
    tag = "Comparison"
)]
pub async fn compare_batch(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BatchCompareRequest>,
) -> Result<Json<ApiResponse<BatchCompareResponse>>, AppError> {
    let results = state.orchestrator.compare_batch(&req.region_ids).await?;
    let succeeded = results.iter().filter(|entry| entry.report.is_some()).count();

    Ok(Json(ApiResponse::success(BatchCompareResponse {
        requested: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        results,
    })))
}

#[utoipa::path(
    get,
    path = "/api/regions",
    responses((status = 200, description = "Region ids known to the reference data")),
    tag = "System"
)]
pub async fn list_regions(State(state): State<AppState>) -> Json<ApiResponse<RegionsResponse>> {
    let region_ids: Vec<String> = state
        .orchestrator
        .regions()
        .await
        .into_iter()
        .map(|id| id.to_string())
        .collect();

    Json(ApiResponse::success(RegionsResponse {
        count: region_ids.len(),
        region_ids,
    }))
}
