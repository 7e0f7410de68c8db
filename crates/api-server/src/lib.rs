use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use income_core::PredictionError;
use prediction_orchestrator::PredictionOrchestrator;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

pub mod config;
pub mod prediction_routes;
pub mod request_id;

#[cfg(test)]
mod router_tests;

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PredictionOrchestrator>,
}

impl AppState {
    /// Wire the reference store, oracle and policy named by `config`.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let policy = config.load_policy()?;
        let store = config.load_region_store()?;
        let ml = ml_client::build_predictor(&config.ml).context("building ML oracle")?;

        tracing::info!(
            "Prediction policy {}, ML backend {}, oracle timeout {:?}",
            policy.version,
            ml.backend_name(),
            config.ml.timeout
        );

        Ok(Self {
            orchestrator: Arc::new(PredictionOrchestrator::new(
                Arc::new(store),
                ml,
                policy,
                config.ml.timeout,
            )),
        })
    }
}

/// Success envelope for every JSON endpoint
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    field: Option<String>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        let status = match &err {
            PredictionError::Validation { .. } => StatusCode::BAD_REQUEST,
            PredictionError::NotFound(_) => StatusCode::NOT_FOUND,
            PredictionError::Upstream(_) | PredictionError::Timeout(_) => StatusCode::BAD_GATEWAY,
            PredictionError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", err);
        }

        Self {
            status,
            kind: err.kind(),
            field: err.field().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        PredictionError::validation("body", rejection.body_text()).into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "kind": self.kind,
            "message": self.message,
        });
        if let Some(field) = self.field {
            error["field"] = json!(field);
        }

        (self.status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RegionIQ Prediction API",
        description = "Statistical, ML and hybrid regional income estimates with cross-method comparison"
    ),
    paths(
        health,
        prediction_routes::predict_statistical,
        prediction_routes::predict_ml,
        prediction_routes::predict_hybrid,
        prediction_routes::get_statistical,
        prediction_routes::get_ml,
        prediction_routes::get_hybrid,
        prediction_routes::compare_methods,
        prediction_routes::get_comparison,
        prediction_routes::compare_batch,
        prediction_routes::list_regions,
    ),
    components(schemas(
        income_core::PredictionResult,
        income_core::ComparisonReport,
        income_core::BatchComparisonEntry,
        prediction_routes::RegionRequest,
        prediction_routes::BatchCompareRequest,
        prediction_routes::BatchCompareResponse,
        prediction_routes::RegionsResponse,
        HealthResponse,
    )),
    tags(
        (name = "Predictions", description = "Single-method income estimates"),
        (name = "Comparison", description = "Cross-method agreement analysis"),
        (name = "System", description = "Health and metadata")
    )
)]
pub struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub policy_version: String,
    pub ml_backend: String,
    /// Whether the oracle answered its own health check within the timeout
    pub ml_reachable: bool,
    pub ml_timeout_ms: u64,
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service status with policy version and oracle reachability; status is \"degraded\" when the oracle is down")),
    tag = "System"
)]
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let orchestrator = &state.orchestrator;
    let ml_reachable = orchestrator.ml_healthy().await;
    Json(ApiResponse::success(HealthResponse {
        status: if ml_reachable { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy_version: orchestrator.policy_version().to_string(),
        ml_backend: orchestrator.backend_name().to_string(),
        ml_reachable,
        ml_timeout_ms: u64::try_from(orchestrator.ml_timeout().as_millis()).unwrap_or(u64::MAX),
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(prediction_routes::prediction_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(trace)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Install the global subscriber. `RUST_LOG` filters (default `info`);
/// `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_output = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json_output {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    let app = build_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
