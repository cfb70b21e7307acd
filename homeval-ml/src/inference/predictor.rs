//! Single-record and batch prediction.
//!
//! A [`Predictor`] holds the transformer state and the trained model, both
//! loaded once. Requests go through the same derivation and encoding as the
//! training data.

use crate::data::{HouseRecord, SchemaDefinition, SchemaError, SchemaIssue, validate_record};
use crate::error::MlError;
use crate::features::{FittedTransformerState, store};
use crate::training::{TrainedModel, load_model};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Relative half-width of the reported price interval.
const INTERVAL_SPREAD: f64 = 0.1;

/// One house to price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousePredictionRequest {
    pub sqft: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub location: String,
    pub year_built: f64,
    pub condition: String,
}

impl HousePredictionRequest {
    /// Type-check a JSON object against `schema`, then deserialize it.
    pub fn from_json(value: &serde_json::Value, schema: &SchemaDefinition) -> Result<Self, MlError> {
        let object = value
            .as_object()
            .ok_or_else(|| MlError::invalid_input("request body must be a JSON object"))?;
        validate_record(object, schema)?;
        serde_json::from_value(value.clone()).map_err(|e| MlError::invalid_input(e.to_string()))
    }

    /// Range-check the request and convert it to a typed record.
    pub fn to_record(&self) -> Result<HouseRecord, MlError> {
        let numbers = [
            ("sqft", self.sqft),
            ("bedrooms", self.bedrooms),
            ("bathrooms", self.bathrooms),
            ("year_built", self.year_built),
        ];
        if let Some((name, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MlError::invalid_input(format!("{name} must be a finite number")));
        }
        if self.sqft <= 0.0 {
            return Err(MlError::invalid_input("sqft must be positive"));
        }
        if self.bathrooms < 0.0 {
            return Err(MlError::invalid_input("bathrooms must not be negative"));
        }
        let whole = |name: &str, v: f64| -> Result<f64, MlError> {
            if v.fract() == 0.0 {
                Ok(v)
            } else {
                Err(MlError::invalid_input(format!("{name} must be a whole number")))
            }
        };
        let bedrooms = whole("bedrooms", self.bedrooms)?;
        if bedrooms < 0.0 {
            return Err(MlError::invalid_input("bedrooms must not be negative"));
        }
        if bedrooms > f64::from(u32::MAX) {
            return Err(MlError::invalid_input("bedrooms is out of range"));
        }
        let year_built = whole("year_built", self.year_built)?;
        if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&year_built) {
            return Err(MlError::invalid_input("year_built is out of range"));
        }
        let (location, condition) = (self.location.trim(), self.condition.trim());
        if location.is_empty() || condition.is_empty() {
            return Err(MlError::invalid_input("location and condition must not be empty"));
        }

        Ok(HouseRecord {
            sqft: self.sqft,
            bedrooms: bedrooms as u32,
            bathrooms: self.bathrooms,
            location: location.to_string(),
            year_built: year_built as i32,
            condition: condition.to_string(),
            price: None,
        })
    }
}

/// Prediction for one house.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Rounded to cents.
    pub predicted_price: f64,
    pub confidence_interval: [f64; 2],
    /// Feature → contribution to the prediction (`weight * value`).
    pub features_importance: BTreeMap<String, f64>,
    pub prediction_time: DateTime<Utc>,
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Loaded transformer state and model.
#[derive(Debug, Clone)]
pub struct Predictor {
    state: FittedTransformerState,
    model: TrainedModel,
}

impl Predictor {
    /// Pair a state with a model trained on its output columns.
    pub fn new(state: FittedTransformerState, model: TrainedModel) -> Result<Self, MlError> {
        state.check_consistency().map_err(|reason| {
            MlError::invalid_input(format!("transformer state is inconsistent: {reason}"))
        })?;
        if model.model.feature_columns != state.output_columns {
            return Err(SchemaError::from(vec![SchemaIssue::ColumnOrder {
                expected: state.output_columns.clone(),
                found: model.model.feature_columns.clone(),
            }])
            .into());
        }
        Ok(Self { state, model })
    }

    pub fn load(preprocessor: &Path, model: &Path) -> Result<Self, MlError> {
        let predictor = Self::new(store::load(preprocessor)?, load_model(model)?)?;
        tracing::info!(
            preprocessor = %preprocessor.display(),
            model = %model.display(),
            name = %predictor.model.name,
            "Loaded predictor"
        );
        Ok(predictor)
    }

    pub fn input_schema(&self) -> &SchemaDefinition {
        &self.state.input_schema
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn predict(&self, request: &HousePredictionRequest) -> Result<PredictionResponse, MlError> {
        let row = self.state.transform_record(&request.to_record()?);
        let price = self.model.model.predict_row(&row);
        let features_importance = self
            .model
            .model
            .contributions(&row)
            .map(|(name, c)| (name.to_string(), c))
            .collect();
        Ok(PredictionResponse {
            predicted_price: round_cents(price),
            confidence_interval: [
                round_cents(price * (1.0 - INTERVAL_SPREAD)),
                round_cents(price * (1.0 + INTERVAL_SPREAD)),
            ],
            features_importance,
            prediction_time: Utc::now(),
        })
    }

    /// Price every request, failing on the first invalid one.
    pub fn batch_predict(&self, requests: &[HousePredictionRequest]) -> Result<Vec<f64>, MlError> {
        let mut records = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            let record = request.to_record().map_err(|e| match e {
                MlError::InvalidInput(msg) => MlError::invalid_input(format!("request {i}: {msg}")),
                other => other,
            })?;
            records.push(record);
        }
        let matrix = self.state.transform(&records);
        Ok(matrix
            .rows
            .iter()
            .map(|row| round_cents(self.model.model.predict_row(row)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureTransformer;
    use crate::training::{LinearModel, RegressionMetrics};
    use homeval_core::FeatureConfig;
    use pretty_assertions::assert_eq;

    fn request() -> HousePredictionRequest {
        HousePredictionRequest {
            sqft: 1500.0,
            bedrooms: 3.0,
            bathrooms: 2.0,
            location: "Urban".into(),
            year_built: 1995.0,
            condition: "Good".into(),
        }
    }

    fn predictor() -> Predictor {
        let records = [
            request().to_record().unwrap(),
            HouseRecord {
                sqft: 3000.0,
                bedrooms: 4,
                bathrooms: 3.0,
                location: "Suburban".into(),
                year_built: 2010,
                condition: "Excellent".into(),
                price: None,
            },
        ];
        let state = FeatureTransformer::new(&FeatureConfig::default())
            .with_reference_year(2024)
            .fit_state(&records)
            .unwrap();
        let mut weights = vec![0.0; state.output_columns.len()];
        weights[0] = 1000.0;
        let model = TrainedModel {
            name: "test".into(),
            target: "price".into(),
            alpha: 1.0,
            model: LinearModel {
                feature_columns: state.output_columns.clone(),
                weights,
                intercept: 300000.0,
            },
            metrics: RegressionMetrics::compute(&[1.0], &[1.0]).unwrap(),
            train_rows: 2,
            trained_at: Utc::now(),
        };
        Predictor::new(state, model).unwrap()
    }

    #[test]
    fn test_predict_response_shape() {
        let response = predictor().predict(&request()).unwrap();
        // sqft z-score of the smaller house is -1
        assert_eq!(response.predicted_price, 299000.0);
        assert_eq!(response.confidence_interval, [269100.0, 328900.0]);
        assert_eq!(response.features_importance.len(), 10);
        assert_eq!(response.features_importance["sqft"], -1000.0);
    }

    #[test]
    fn test_unseen_location_still_predicts() {
        let mut req = request();
        req.location = "Mountain".into();
        assert!(predictor().predict(&req).is_ok());
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let p = predictor();
        for mutate in [
            (|r: &mut HousePredictionRequest| r.sqft = 0.0) as fn(&mut HousePredictionRequest),
            |r| r.bedrooms = -1.0,
            |r| r.bedrooms = 2.5,
            |r| r.bathrooms = -0.5,
            |r| r.sqft = f64::INFINITY,
            |r| r.location = "  ".into(),
        ] {
            let mut req = request();
            mutate(&mut req);
            let err = p.predict(&req).unwrap_err();
            assert!(err.is_client_error(), "{err}");
        }
    }

    #[test]
    fn test_bedrooms_range_messages() {
        let mut req = request();
        req.bedrooms = -1.0;
        assert!(req.to_record().unwrap_err().to_string().contains("must not be negative"));

        req.bedrooms = 1e10;
        let msg = req.to_record().unwrap_err().to_string();
        assert!(msg.contains("bedrooms is out of range"), "{msg}");
    }

    #[test]
    fn test_new_rejects_inconsistent_state() {
        let Predictor { mut state, model } = predictor();
        state.numeric.pop();
        let err = Predictor::new(state, model).unwrap_err();
        assert!(matches!(err, MlError::InvalidInput(_)), "{err}");
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn test_batch_predict_names_bad_request() {
        let p = predictor();
        let mut bad = request();
        bad.sqft = -5.0;
        let err = p.batch_predict(&[request(), bad]).unwrap_err();
        assert!(err.to_string().contains("request 1"));

        let prices = p.batch_predict(&[request(), request()]).unwrap();
        assert_eq!(prices, vec![299000.0, 299000.0]);
    }

    #[test]
    fn test_from_json_type_checks() {
        let p = predictor();
        let body = serde_json::json!({
            "sqft": "huge", "bedrooms": 3, "bathrooms": 2,
            "location": "Urban", "year_built": 1995, "condition": "Good"
        });
        let err = HousePredictionRequest::from_json(&body, p.input_schema()).unwrap_err();
        assert!(matches!(err, MlError::Schema(_)));

        let body = serde_json::json!({
            "sqft": 1500, "bedrooms": 3, "bathrooms": 2,
            "location": "Urban", "year_built": 1995, "condition": "Good"
        });
        let req = HousePredictionRequest::from_json(&body, p.input_schema()).unwrap();
        assert_eq!(req, request());
    }

    #[test]
    fn test_model_must_match_state_columns() {
        let p = predictor();
        let mut model = p.model().clone();
        model.model.feature_columns.reverse();
        assert!(Predictor::new(p.state.clone(), model).is_err());
    }
}
