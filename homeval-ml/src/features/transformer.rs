//! Feature transformer: fit mode and transform mode.
//!
//! Fit mode computes statistics and encodings over a cleaned dataset and
//! returns them as a [`FittedTransformerState`]. Transform mode lives on the
//! state itself and only ever reads it. Both modes run every record through
//! [`derive_columns`] and then [`FittedTransformerState::encode`], which is the
//! single place scaling and encoding happen.

use crate::data::{
    CleanedDataset, DataBatch, HouseRecord, RawColumns, SchemaDefinition, SchemaError,
    SchemaIssue, validate_batch,
};
use crate::error::MlError;
use crate::features::derive::{
    CATEGORICAL_FEATURES, DerivedColumns, LAYOUT, NUMERIC_FEATURES, Slot, derive_columns,
};
use crate::features::matrix::{FeatureMatrix, TargetColumn};
use crate::features::state::{CategoryEncoding, FittedTransformerState, NumericStats};
use chrono::Datelike;
use homeval_core::FeatureConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Builds a [`FittedTransformerState`] from a cleaned dataset.
#[derive(Debug, Clone)]
pub struct FeatureTransformer<'a> {
    features: &'a FeatureConfig,
    reference_year: Option<i32>,
}

impl<'a> FeatureTransformer<'a> {
    pub fn new(features: &'a FeatureConfig) -> Self {
        Self {
            features,
            reference_year: None,
        }
    }

    /// Measure ages from `year` instead of the current calendar year.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    /// Fit statistics and encodings over `records`.
    pub fn fit_state(&self, records: &[HouseRecord]) -> Result<FittedTransformerState, MlError> {
        if records.is_empty() {
            return Err(MlError::EmptyDataset {
                stage: "feature fitting".into(),
                input_rows: 0,
            });
        }
        let reference_year = self
            .reference_year
            .unwrap_or_else(|| chrono::Utc::now().year());
        let derived: Vec<DerivedColumns> = records
            .iter()
            .map(|r| derive_columns(r, reference_year))
            .collect();

        let numeric = NUMERIC_FEATURES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut values: Vec<f64> = derived.iter().map(|d| d.numeric[i]).collect();
                NumericStats::fit(name, &mut values)
            })
            .collect();
        let categorical = CATEGORICAL_FEATURES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                CategoryEncoding::fit(
                    name,
                    self.features.encoding_for(name),
                    derived.iter().map(|d| d.categorical[i].as_str()),
                )
            })
            .collect();

        let mut state = FittedTransformerState {
            reference_year,
            scaling: self.features.scaling,
            input_schema: SchemaDefinition::for_features(self.features),
            numeric,
            categorical,
            output_columns: Vec::new(),
            fitted_rows: records.len(),
        };
        state.output_columns = state.layout_columns();

        tracing::info!(
            rows = state.fitted_rows,
            reference_year,
            output_columns = state.output_columns.len(),
            "Fitted feature transformer"
        );
        Ok(state)
    }

    /// Fit over a cleaned dataset and transform it with the fitted state.
    pub fn fit(
        &self,
        data: &CleanedDataset,
    ) -> Result<(FeatureMatrix, FittedTransformerState), MlError> {
        let state = self.fit_state(&data.records)?;
        let mut matrix = state.transform(&data.records);
        if data.has_target {
            matrix.target = Some(TargetColumn {
                name: self.features.target.clone(),
                values: data.records.iter().filter_map(|r| r.price).collect(),
            });
        }
        Ok((matrix, state))
    }
}

/// Inputs that fell outside what the transformer saw during fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub rows: usize,
    /// Column → number of values clipped to the fit-time range.
    pub clipped: BTreeMap<String, usize>,
    /// Column → number of values mapped to the unknown bucket.
    pub unseen: BTreeMap<String, usize>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.clipped.is_empty() && self.unseen.is_empty()
    }

    fn log(&self) {
        if !self.is_empty() {
            tracing::warn!(
                rows = self.rows,
                clipped = ?self.clipped,
                unseen = ?self.unseen,
                "Inputs outside the fitted range"
            );
        }
    }
}

impl FittedTransformerState {
    /// Scale and encode derived columns into one feature vector.
    pub fn encode(&self, derived: &DerivedColumns, drift: &mut DriftReport) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_columns.len());
        for slot in LAYOUT {
            match slot {
                Slot::Numeric(i) => {
                    let stats = &self.numeric[i];
                    let raw = derived.numeric[i];
                    if stats.clip(raw).1 {
                        *drift.clipped.entry(stats.column.clone()).or_default() += 1;
                    }
                    out.push(stats.scale(raw, self.scaling));
                }
                Slot::Categorical(i) => {
                    let enc = &self.categorical[i];
                    if !enc.encode_into(&derived.categorical[i], &mut out) {
                        *drift.unseen.entry(enc.column.clone()).or_default() += 1;
                    }
                }
            }
        }
        drift.rows += 1;
        out
    }

    /// Feature vectors for `records`, plus what drifted.
    pub fn transform_with_drift(&self, records: &[HouseRecord]) -> (FeatureMatrix, DriftReport) {
        let mut drift = DriftReport::default();
        let rows = records
            .iter()
            .map(|r| self.encode(&derive_columns(r, self.reference_year), &mut drift))
            .collect();
        drift.log();
        let matrix = FeatureMatrix {
            columns: self.output_columns.clone(),
            rows,
            target: None,
        };
        (matrix, drift)
    }

    pub fn transform(&self, records: &[HouseRecord]) -> FeatureMatrix {
        self.transform_with_drift(records).0
    }

    /// Feature vector of a single record.
    pub fn transform_record(&self, record: &HouseRecord) -> Vec<f64> {
        let mut drift = DriftReport::default();
        let row = self.encode(&derive_columns(record, self.reference_year), &mut drift);
        drift.log();
        row
    }

    /// Transform a tabular batch, carrying `target` through when present.
    ///
    /// Fails with a [`SchemaError`] naming every input column the state
    /// expects but the batch lacks, or every cell of the wrong type.
    pub fn transform_batch(&self, batch: &DataBatch, target: &str) -> Result<FeatureMatrix, MlError> {
        let missing: Vec<SchemaIssue> = self
            .input_schema
            .columns
            .iter()
            .filter(|c| !batch.has_column(&c.name))
            .map(|c| SchemaIssue::MissingColumn {
                column: c.name.clone(),
            })
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::from(missing).into());
        }
        validate_batch(batch, &self.input_schema)?;

        let columns = RawColumns::resolve(batch, target)?;
        let mut records = Vec::with_capacity(batch.row_count());
        for row in 0..batch.row_count() {
            let record = columns.read(batch, row).complete().map_err(|field| {
                MlError::invalid_input(format!("row {row}: missing or invalid '{field}'"))
            })?;
            records.push(record);
        }

        let mut matrix = self.transform(&records);
        if columns.has_target() {
            let values: Option<Vec<f64>> = records.iter().map(|r| r.price).collect();
            let values = values.ok_or_else(|| {
                MlError::invalid_input(format!("'{target}' has missing values"))
            })?;
            matrix.target = Some(TargetColumn {
                name: target.to_string(),
                values,
            });
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{clean_with_year, parse_csv};
    use crate::features::state::UNKNOWN_CODE;
    use homeval_core::EncodingMethod;
    use pretty_assertions::assert_eq;

    fn record(sqft: f64, location: &str, year_built: i32) -> HouseRecord {
        HouseRecord {
            sqft,
            bedrooms: 3,
            bathrooms: 2.0,
            location: location.into(),
            year_built,
            condition: "Good".into(),
            price: Some(sqft * 200.0),
        }
    }

    fn fitted(features: &FeatureConfig) -> FittedTransformerState {
        FeatureTransformer::new(features)
            .with_reference_year(2024)
            .fit_state(&[
                record(500.0, "urban", 2000),
                record(5000.0, "suburban", 1950),
                record(2000.0, "urban", 1990),
            ])
            .unwrap()
    }

    #[test]
    fn test_output_columns_ordinal() {
        let state = fitted(&FeatureConfig::default());
        assert_eq!(
            state.output_columns,
            vec![
                "sqft",
                "bedrooms",
                "bathrooms",
                "age",
                "location_encoded",
                "condition_encoded",
                "bed_bath_ratio",
                "sqft_per_room",
                "age_bucket_encoded",
                "location_condition_encoded",
            ]
        );
        state.check_consistency().unwrap();
    }

    #[test]
    fn test_one_hot_override_expands_in_place() {
        let mut features = FeatureConfig::default();
        features
            .encoding_overrides
            .insert("location".into(), EncodingMethod::OneHot);
        let state = fitted(&features);
        assert_eq!(
            &state.output_columns[4..8],
            &[
                "location=suburban",
                "location=urban",
                "location=__unknown__",
                "condition_encoded",
            ]
        );
        let row = state.transform_record(&record(1000.0, "rural", 2000));
        assert_eq!(row.len(), state.output_columns.len());
        assert_eq!(&row[4..7], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_gets_unknown_code() {
        let state = fitted(&FeatureConfig::default());
        let (matrix, drift) = state.transform_with_drift(&[record(1000.0, "rural", 2000)]);
        assert_eq!(matrix.rows[0][4], UNKNOWN_CODE);
        assert_eq!(drift.unseen.get("location"), Some(&1));
        assert_eq!(drift.unseen.get("location_condition"), Some(&1));
    }

    #[test]
    fn test_out_of_range_is_clipped() {
        let state = fitted(&FeatureConfig::default());
        let big = state.transform_record(&record(10000.0, "urban", 2000));
        let max = state.transform_record(&record(5000.0, "urban", 2000));
        assert_eq!(big[0], max[0]);

        let (_, drift) = state.transform_with_drift(&[record(10000.0, "urban", 2000)]);
        assert_eq!(drift.clipped.get("sqft"), Some(&1));
    }

    #[test]
    fn test_fit_transform_matches_replay() {
        let features = FeatureConfig {
            price_outlier_iqr: None,
            ..Default::default()
        };
        let text = "sqft,bedrooms,bathrooms,location,year_built,condition,price\n\
                    1500,3,2,Urban,1995,Good,350000\n\
                    900,1,1,Rural,1950,Fair,120000\n\
                    3200,5,3.5,Waterfront,2015,Excellent,1250000\n";
        let batch = parse_csv(text.as_bytes(), ',').unwrap();
        let cleaned = clean_with_year(&batch, &features, 2024).unwrap();
        let (matrix, state) = FeatureTransformer::new(&features)
            .with_reference_year(2024)
            .fit(&cleaned)
            .unwrap();

        let replay = state.transform_batch(&batch, "price").unwrap();
        assert_eq!(replay, matrix);
        assert_eq!(
            matrix.target.as_ref().map(|t| t.values.clone()),
            Some(vec![350000.0, 120000.0, 1250000.0])
        );
    }

    #[test]
    fn test_transform_batch_names_missing_columns() {
        let state = fitted(&FeatureConfig::default());
        let batch = parse_csv("sqft,bedrooms,location\n1,2,Urban\n".as_bytes(), ',').unwrap();
        let err = state.transform_batch(&batch, "price").unwrap_err();
        let MlError::Schema(schema) = err else {
            panic!("expected schema error");
        };
        assert_eq!(
            schema.columns(),
            vec!["bathrooms", "year_built", "condition"]
        );
    }

    #[test]
    fn test_fit_on_nothing_is_empty_dataset() {
        let features = FeatureConfig::default();
        let err = FeatureTransformer::new(&features).fit_state(&[]).unwrap_err();
        assert!(matches!(err, MlError::EmptyDataset { .. }));
    }
}
