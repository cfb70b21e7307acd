//! Integration tests for the prediction HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use homeval_core::FeatureConfig;
use homeval_ml::data::HouseRecord;
use homeval_ml::features::FeatureTransformer;
use homeval_ml::inference::{Predictor, SharedPredictor, router};
use homeval_ml::training::{LinearModel, RegressionMetrics, TrainedModel};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn house(sqft: f64, location: &str, year_built: i32) -> HouseRecord {
    HouseRecord {
        sqft,
        bedrooms: 3,
        bathrooms: 2.0,
        location: location.to_string(),
        year_built,
        condition: "Good".to_string(),
        price: None,
    }
}

fn make_predictor() -> SharedPredictor {
    let records = [
        house(1200.0, "Urban", 1980),
        house(2400.0, "Suburban", 2000),
        house(3600.0, "Rural", 2020),
    ];
    let state = FeatureTransformer::new(&FeatureConfig::default())
        .with_reference_year(2024)
        .fit_state(&records)
        .unwrap();
    let mut weights = vec![0.0; state.output_columns.len()];
    weights[0] = 50_000.0;
    let model = TrainedModel {
        name: "house_price_model".into(),
        target: "price".into(),
        alpha: 1.0,
        model: LinearModel {
            feature_columns: state.output_columns.clone(),
            weights,
            intercept: 400_000.0,
        },
        metrics: RegressionMetrics::compute(&[1.0, 2.0], &[1.0, 2.0]).unwrap(),
        train_rows: 3,
        trained_at: Utc::now(),
    };
    Arc::new(Predictor::new(state, model).unwrap())
}

fn valid_body() -> serde_json::Value {
    json!({
        "sqft": 2400,
        "bedrooms": 3,
        "bathrooms": 2,
        "location": "Suburban",
        "year_built": 2000,
        "condition": "Good"
    })
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let app = router(make_predictor());
    let resp = ServiceExt::<Request<Body>>::oneshot(app, request)
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 100_000)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// --- /health ---

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["model"], "house_price_model");
    assert_eq!(json["features"], 10);
}

// --- /predict ---

#[tokio::test]
async fn test_predict_returns_price_and_interval() {
    let (status, json) = send(post("/predict", valid_body().to_string())).await;
    assert_eq!(status, StatusCode::OK);
    // sqft sits at the fitted mean, so only the intercept remains
    assert_eq!(json["predicted_price"], 400_000.0);
    assert_eq!(json["confidence_interval"], json!([360_000.0, 440_000.0]));
    assert_eq!(json["features_importance"].as_object().unwrap().len(), 10);
    assert!(json["prediction_time"].is_string());
}

#[tokio::test]
async fn test_predict_accepts_unseen_location() {
    let mut body = valid_body();
    body["location"] = json!("Lakeside");
    let (status, json) = send(post("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["predicted_price"].is_number());
}

#[tokio::test]
async fn test_predict_negative_sqft_is_bad_request() {
    let mut body = valid_body();
    body["sqft"] = json!(-10);
    let (status, json) = send(post("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], true);
    assert!(json["message"].as_str().unwrap().contains("sqft"));
}

#[tokio::test]
async fn test_predict_text_sqft_is_bad_request() {
    let mut body = valid_body();
    body["sqft"] = json!("large");
    let (status, json) = send(post("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("sqft"));
}

#[tokio::test]
async fn test_predict_missing_field_is_bad_request() {
    let mut body = valid_body();
    body.as_object_mut().unwrap().remove("condition");
    let (status, json) = send(post("/predict", body.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("condition"));
}

#[tokio::test]
async fn test_predict_malformed_json_is_rejected() {
    let (status, _) = send(post("/predict", "{\"sqft\": ".to_string())).await;
    assert!(status.is_client_error());
}

// --- /batch_predict ---

#[tokio::test]
async fn test_batch_predict_keeps_order() {
    let mut larger = valid_body();
    larger["sqft"] = json!(3600);
    let body = json!([valid_body(), larger]).to_string();
    let (status, json) = send(post("/batch_predict", body)).await;
    assert_eq!(status, StatusCode::OK);
    let prices = json.as_array().unwrap();
    assert_eq!(prices.len(), 2);
    assert!(prices[1].as_f64().unwrap() > prices[0].as_f64().unwrap());
}

#[tokio::test]
async fn test_batch_predict_names_failing_request() {
    let mut bad = valid_body();
    bad["bathrooms"] = json!(-1);
    let body = json!([valid_body(), bad]).to_string();
    let (status, json) = send(post("/batch_predict", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("request 1"));
}
