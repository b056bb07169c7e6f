//! HTTP surface for the validation engine
//!
//! One synchronous inbound endpoint plus a read-only metrics surface.
//! Domain-level failures never map to HTTP errors; only malformed input
//! does.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use common::{ValidationAlert, ValidationError, ValidationMetricsRecord, ValidationReport};
use monitoring::{AggregatedMetrics, AlertNotifier, HealthStatus, RuleEngine, ValidationMonitor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use validation::{DomainDataset, ValidationOptions, ValidationOrchestrator};

pub struct AppState {
    pub orchestrator: ValidationOrchestrator,
    pub monitor: ValidationMonitor,
    pub rules: RuleEngine,
    pub notifier: AlertNotifier,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/validate", post(validate))
        .route("/api/v1/metrics", get(metrics))
        .route("/api/v1/metrics/prometheus", get(metrics_prometheus))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub symbol: String,
    pub dataset: DomainDataset,
    #[serde(default)]
    pub options: ValidationOptions,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub aggregated_metrics: AggregatedMetrics,
    pub active_alerts: Vec<ValidationAlert>,
    pub recent_validations: Vec<ValidationMetricsRecord>,
    pub health_status: HealthStatus,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// POST /api/v1/validate
async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    match state
        .orchestrator
        .validate(&request.symbol, request.dataset, request.options)
        .await
    {
        Ok(report) => Ok(Json(report)),
        Err(ValidationError::InvalidInput(message)) => Err(bad_request(message)),
        Err(e) => {
            // The orchestrator only errs on invalid input; anything else
            // would be a bug worth loud logging.
            error!("Unexpected validation failure: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            ))
        }
    }
}

/// GET /api/v1/metrics — dashboard snapshot from the in-process ring buffer
async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let aggregated = state.monitor.aggregate(state.rules.window()).await;
    Json(MetricsResponse {
        health_status: state.rules.health(&aggregated),
        active_alerts: state.notifier.active_alerts().await,
        recent_validations: state.monitor.recent(50).await,
        aggregated_metrics: aggregated,
    })
}

/// GET /api/v1/metrics/prometheus — exposition-format counters
async fn metrics_prometheus(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state.monitor.prometheus_text().map_err(|e| {
        error!("Failed to encode prometheus metrics: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "metrics encoding failed" })),
        )
    })
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let aggregated = state.monitor.aggregate(state.rules.window()).await;
    Json(json!({ "status": state.rules.health(&aggregated) }))
}
