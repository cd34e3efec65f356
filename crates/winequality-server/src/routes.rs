//! HTTP routes and handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, warn};
use winequality_core::Error;
use winequality_model::{model_info as describe_model, predict_quality as predict, ModelInfo, PredictionResponse};

use crate::extract::ValidatedJson;
use crate::state::AppState;

/// Build the service router with its body limit and request tracing
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/predict-quality", post(predict_quality))
        .route("/model-info", get(model_info))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Predict the quality score of one wine sample
async fn predict_quality(
    State(state): State<AppState>,
    ValidatedJson(sample): ValidatedJson,
) -> Result<Json<PredictionResponse>, AppError> {
    metrics::counter!("winequality_requests_total", "endpoint" => "predict-quality").increment(1);

    let quality = predict(&state.model, &sample)?;
    debug!(quality = quality.value(), "Prediction served");
    metrics::counter!("winequality_predictions_total", "quality" => quality.to_string())
        .increment(1);

    Ok(Json(PredictionResponse { quality }))
}

/// Report whether the model is loaded and describe it
async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    metrics::counter!("winequality_requests_total", "endpoint" => "model-info").increment(1);
    Json(describe_model(&state.model))
}

async fn fallback() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" }))).into_response()
}

/// Handler failure, rendered as `{"detail": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("Prediction error: {0}")]
    Prediction(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        metrics::counter!("winequality_errors_total", "kind" => err.kind()).increment(1);
        match err {
            Error::ModelUnavailable => {
                warn!("Prediction requested but no model is loaded");
                AppError::ModelUnavailable
            }
            other => {
                error!("Prediction failed: {}", other);
                AppError::Prediction(other.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "detail": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
