//! Cleaning stage: drop rows that cannot be trusted for training.
//!
//! Rows are dropped, never imputed. Each row is judged by the first rule it
//! breaks, in this order:
//!
//! 1. a required field (or the target, when the column exists) is missing
//! 2. a categorical value lies outside its configured domain
//! 3. a value is physically impossible (`sqft <= 0`, negative counts,
//!    a build year in the future, a non-positive price)
//! 4. the row duplicates an earlier row on every feature column
//! 5. the price is an IQR outlier (only when a multiplier is configured)

use crate::data::record::{HouseRecord, RAW_FIELDS, RawColumns, RawRecord};
use crate::data::schema::{SchemaDefinition, validate_batch};
use crate::data::source::DataBatch;
use crate::error::MlError;
use chrono::Datelike;
use homeval_core::FeatureConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Why a row was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingValue,
    UnknownCategory,
    InvalidDomain,
    Duplicate,
    PriceOutlier,
}

/// Row accounting for one cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl CleaningReport {
    pub fn dropped(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    fn record(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_default() += 1;
    }
}

/// Rows that passed every cleaning rule, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedDataset {
    pub records: Vec<HouseRecord>,
    /// Whether the source carried the target column.
    pub has_target: bool,
    pub report: CleaningReport,
}

impl CleanedDataset {
    /// Header for the cleaned file: raw fields, then the target if present.
    pub fn columns(&self, target: &str) -> Vec<String> {
        let mut columns: Vec<String> = RAW_FIELDS.iter().map(|c| c.to_string()).collect();
        if self.has_target {
            columns.push(target.to_string());
        }
        columns
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.records.iter().map(|r| r.to_cells(self.has_target))
    }

    /// Rebuild a dataset from a previously written cleaned file.
    ///
    /// No rule is re-applied (a second IQR pass would move the bounds); every
    /// row must already be complete.
    pub fn from_batch(batch: &DataBatch, features: &FeatureConfig) -> Result<Self, MlError> {
        let columns = RawColumns::resolve(batch, &features.target)?;
        validate_for(batch, &columns, features)?;

        let mut records = Vec::with_capacity(batch.row_count());
        for row in 0..batch.row_count() {
            let raw = columns.read(batch, row);
            if columns.has_target() && raw.price.is_none() {
                return Err(MlError::invalid_input(format!(
                    "cleaned dataset row {row} has no '{}' value",
                    features.target
                )));
            }
            let record = raw.complete().map_err(|field| {
                MlError::invalid_input(format!(
                    "cleaned dataset row {row} has an invalid '{field}' value"
                ))
            })?;
            records.push(record);
        }
        if records.is_empty() {
            return Err(MlError::EmptyDataset {
                stage: "loading cleaned data".into(),
                input_rows: 0,
            });
        }

        let n = records.len();
        Ok(Self {
            records,
            has_target: columns.has_target(),
            report: CleaningReport {
                input_rows: n,
                output_rows: n,
                dropped: BTreeMap::new(),
            },
        })
    }
}

/// Validate against the training schema when the target column is present.
fn validate_for(
    batch: &DataBatch,
    columns: &RawColumns,
    features: &FeatureConfig,
) -> Result<(), MlError> {
    let schema = if columns.has_target() {
        SchemaDefinition::for_training(features)
    } else {
        SchemaDefinition::for_features(features)
    };
    validate_batch(batch, &schema)?;
    Ok(())
}

/// Clean a raw batch, judging build years against the current calendar year.
pub fn clean(batch: &DataBatch, features: &FeatureConfig) -> Result<CleanedDataset, MlError> {
    clean_with_year(batch, features, chrono::Utc::now().year())
}

/// Clean a raw batch with an explicit current year.
///
/// The batch is schema-validated first, so text in a numeric column fails
/// the stage instead of being counted as a missing value.
pub fn clean_with_year(
    batch: &DataBatch,
    features: &FeatureConfig,
    current_year: i32,
) -> Result<CleanedDataset, MlError> {
    let columns = RawColumns::resolve(batch, &features.target)?;
    validate_for(batch, &columns, features)?;
    let has_target = columns.has_target();
    let mut report = CleaningReport {
        input_rows: batch.row_count(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(batch.row_count());
    for row in 0..batch.row_count() {
        let raw = columns.read(batch, row);
        let verdict = judge(raw, has_target, features, current_year).and_then(|record| {
            if seen.insert(identity_key(&record)) {
                Ok(record)
            } else {
                Err(DropReason::Duplicate)
            }
        });
        match verdict {
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::debug!(row, ?reason, "Dropping row");
                report.record(reason);
            }
        }
    }

    if has_target {
        if let Some(k) = features.price_outlier_iqr {
            let before = records.len();
            records = drop_price_outliers(records, k);
            for _ in records.len()..before {
                report.record(DropReason::PriceOutlier);
            }
        }
    }

    report.output_rows = records.len();
    tracing::info!(
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        dropped = ?report.dropped,
        "Cleaning complete"
    );

    if records.is_empty() {
        return Err(MlError::EmptyDataset {
            stage: "cleaning".into(),
            input_rows: report.input_rows,
        });
    }

    Ok(CleanedDataset {
        records,
        has_target,
        report,
    })
}

fn judge(
    raw: RawRecord,
    has_target: bool,
    features: &FeatureConfig,
    current_year: i32,
) -> Result<HouseRecord, DropReason> {
    if raw.first_missing().is_some() || (has_target && raw.price.is_none()) {
        return Err(DropReason::MissingValue);
    }

    let categories = [("location", &raw.location), ("condition", &raw.condition)];
    for (column, value) in categories {
        if let (Some(domain), Some(value)) = (features.domains.get(column), value) {
            if !domain.iter().any(|d| d.trim() == value.as_str()) {
                return Err(DropReason::UnknownCategory);
            }
        }
    }

    let impossible = raw.sqft.is_some_and(|v| v <= 0.0)
        || raw.bedrooms.is_some_and(|v| v < 0)
        || raw.bathrooms.is_some_and(|v| v < 0.0)
        || raw.year_built.is_some_and(|v| v > i64::from(current_year))
        || raw.price.is_some_and(|v| v <= 0.0);
    if impossible {
        return Err(DropReason::InvalidDomain);
    }

    // Only out-of-range integers can still fail here.
    raw.complete().map_err(|_| DropReason::InvalidDomain)
}

type IdentityKey = (u64, u32, u64, String, i32, String);

fn identity_key(r: &HouseRecord) -> IdentityKey {
    // -0.0 and 0.0 compare equal as values; normalise before taking bits.
    let bits = |v: f64| (v + 0.0).to_bits();
    (
        bits(r.sqft),
        r.bedrooms,
        bits(r.bathrooms),
        r.location.clone(),
        r.year_built,
        r.condition.clone(),
    )
}

fn drop_price_outliers(records: Vec<HouseRecord>, k: f64) -> Vec<HouseRecord> {
    let mut prices: Vec<f64> = records.iter().filter_map(|r| r.price).collect();
    if prices.len() < 2 {
        return records;
    }
    prices.sort_by(f64::total_cmp);
    let q1 = quantile(&prices, 0.25);
    let q3 = quantile(&prices, 0.75);
    let iqr = q3 - q1;
    let (low, high) = (q1 - k * iqr, q3 + k * iqr);
    tracing::debug!(q1, q3, low, high, "Price outlier bounds");
    records
        .into_iter()
        .filter(|r| r.price.is_none_or(|p| (low..=high).contains(&p)))
        .collect()
}

/// Linear-interpolated quantile of sorted values.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
