//! HTTP prediction API built on axum.

use crate::error::MlError;
use crate::inference::predictor::{HousePredictionRequest, PredictionResponse, Predictor};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Predictor shared across handlers. It is read-only after loading.
pub type SharedPredictor = Arc<Predictor>;

/// Maps pipeline errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(MlError);

impl From<MlError> for ApiError {
    fn from(e: MlError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_client_error() {
            (StatusCode::BAD_REQUEST, self.0.to_string())
        } else {
            tracing::error!(error = %self.0, "Prediction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "prediction failed, check server logs".to_string(),
            )
        };
        let body = Json(serde_json::json!({ "error": true, "message": message }));
        (status, body).into_response()
    }
}

/// Build the router: `GET /health`, `POST /predict`, `POST /batch_predict`.
pub fn router(predictor: SharedPredictor) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/batch_predict", post(batch_predict_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(predictor)
}

async fn health_handler(State(predictor): State<SharedPredictor>) -> impl IntoResponse {
    let model = predictor.model();
    Json(serde_json::json!({
        "status": "healthy",
        "model_loaded": true,
        "model": model.name,
        "features": model.model.feature_columns.len(),
        "trained_at": model.trained_at,
    }))
}

async fn predict_handler(
    State(predictor): State<SharedPredictor>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let request = HousePredictionRequest::from_json(&body, predictor.input_schema())?;
    Ok(Json(predictor.predict(&request)?))
}

async fn batch_predict_handler(
    State(predictor): State<SharedPredictor>,
    Json(body): Json<Vec<serde_json::Value>>,
) -> Result<Json<Vec<f64>>, ApiError> {
    let requests = body
        .iter()
        .enumerate()
        .map(|(i, value)| {
            HousePredictionRequest::from_json(value, predictor.input_schema()).map_err(|e| match e {
                MlError::InvalidInput(msg) => MlError::invalid_input(format!("request {i}: {msg}")),
                other => other,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(predictor.batch_predict(&requests)?))
}

/// Serve the prediction API until ctrl+c.
pub async fn run(predictor: SharedPredictor, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(predictor);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Prediction API listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received, stopping server");
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
