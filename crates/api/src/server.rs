use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use eval::config::ExportConfig;
use eval::{EvalError, EvaluationInput, EvaluationReport, Evaluator, RunOptions};
use similarity::{CacheStats, EmbeddingCache, SimilarityError};

use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

#[derive(Clone)]
pub struct AppState {
    evaluator: Arc<Evaluator>,
    cache: Option<Arc<EmbeddingCache>>,
    metrics: Arc<Metrics>,
    ollama_url: String,
    export: ExportConfig,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(
        evaluator: Evaluator,
        cache: Option<Arc<EmbeddingCache>>,
        ollama_url: String,
        export: ExportConfig,
    ) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            cache,
            metrics: Metrics::new(),
            ollama_url,
            export,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Similarity backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Only request overrides can fail here; configured weights are checked at startup
    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl From<EvalError> for ApiError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Similarity(SimilarityError::BackendUnavailable(msg)) => ApiError::BackendUnavailable(msg),
            EvalError::Score(e) => ApiError::InvalidWeights(e.to_string()),
            EvalError::Extraction(e) => ApiError::Extraction(format!("{:#}", e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidWeights(_) => StatusCode::BAD_REQUEST,
            ApiError::Extraction(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    ollama: String,
}

/// Texts or pre-extracted triples, plus optional per-run overrides
#[derive(Deserialize)]
struct EvaluateRequest {
    #[serde(flatten)]
    input: EvaluationInput,
    #[serde(flatten)]
    options: RunOptions,
}

#[derive(Serialize)]
struct CacheStatsResponse {
    enabled: bool,
    stats: Option<CacheStats>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/evaluate", post(evaluate))
        .route("/metrics", get(get_metrics))
        .route("/cache/stats", get(cache_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let url = format!("{}/api/tags", state.ollama_url);
    let ollama = match state.http.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => "ok".to_string(),
        Ok(resp) => format!("error: status {}", resp.status()),
        Err(e) => format!("error: {}", e),
    };

    let status = if ollama == "ok" { "healthy" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        ollama,
    })
}

async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluationReport>, ApiError> {
    let timer = TimedOperation::start();
    let result = state.evaluator.run(req.input, &req.options).await;
    state.metrics.record_request(result.is_ok(), timer.elapsed());

    let report = result.map_err(|e| {
        tracing::error!("Evaluation failed: {}", e);
        ApiError::from(e)
    })?;
    state.metrics.record_evaluation(&report);

    if let Err(e) = report.export(&state.export) {
        tracing::warn!("Failed to export report {}: {:#}", report.run_id, e);
    }

    Ok(Json(report))
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        enabled: state.cache.is_some(),
        stats: state.cache.as_ref().map(|cache| cache.stats()),
    })
}
