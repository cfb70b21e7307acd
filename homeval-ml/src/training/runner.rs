//! Training driver: split, fit, evaluate.

use crate::data::{SchemaError, SchemaIssue};
use crate::error::MlError;
use crate::features::{FeatureMatrix, FittedTransformerState};
use crate::training::linear::RidgeRegression;
use crate::training::metrics::RegressionMetrics;
use crate::training::model_store::TrainedModel;
use homeval_core::PipelineConfig;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Shuffle row indices with a seeded RNG and split off a test set.
///
/// The test set holds `ceil(n * test_size)` rows, kept between 1 and `n - 1`.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>), MlError> {
    if n < 2 {
        return Err(MlError::training(format!(
            "need at least 2 rows to split into train and test, got {n}"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Train a ridge model on a featured dataset.
///
/// The featured columns must be exactly the transformer state's output
/// columns, in order; anything else means the dataset and the artifact come
/// from different fits.
pub fn train_model(
    featured: &FeatureMatrix,
    state: &FittedTransformerState,
    config: &PipelineConfig,
) -> Result<TrainedModel, MlError> {
    if featured.columns != state.output_columns {
        return Err(SchemaError::from(vec![SchemaIssue::ColumnOrder {
            expected: state.output_columns.clone(),
            found: featured.columns.clone(),
        }])
        .into());
    }
    let target = featured.target.as_ref().ok_or_else(|| {
        SchemaError::from(vec![SchemaIssue::MissingColumn {
            column: config.features.target.clone(),
        }])
    })?;

    let model_cfg = &config.model;
    let (train, test) = split_indices(featured.len(), model_cfg.test_size, model_cfg.seed)?;
    if test.len() < 2 {
        tracing::warn!(
            test_rows = test.len(),
            "Test split has fewer than 2 rows; r2 is not informative"
        );
    }
    let design = |idx: &[usize]| -> Array2<f64> {
        Array2::from_shape_fn((idx.len(), featured.columns.len()), |(r, c)| {
            featured.rows[idx[r]][c]
        })
    };
    let targets = |idx: &[usize]| -> Array1<f64> { idx.iter().map(|&i| target.values[i]).collect() };

    let model = RidgeRegression::new(model_cfg.alpha).fit(
        &featured.columns,
        &design(&train),
        &targets(&train),
    )?;
    let predictions = model.predict(&design(&test));
    let metrics = RegressionMetrics::compute(&targets(&test).to_vec(), &predictions.to_vec())?;

    tracing::info!(
        train_rows = train.len(),
        test_rows = test.len(),
        rmse = metrics.rmse,
        r2 = metrics.r_squared,
        "Trained model"
    );

    Ok(TrainedModel {
        name: model_cfg.name.clone(),
        target: target.name.clone(),
        alpha: model_cfg.alpha,
        model,
        metrics,
        train_rows: train.len(),
        trained_at: chrono::Utc::now(),
    })
}
