//! Inference: the predictor and its HTTP front end.

pub mod predictor;
pub mod server;

pub use predictor::{HousePredictionRequest, PredictionResponse, Predictor};
pub use server::{ApiError, SharedPredictor, router, run};
