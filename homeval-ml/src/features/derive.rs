//! Column derivation shared by fit and transform.
//!
//! Everything that turns a [`HouseRecord`] into engineered columns lives in
//! [`derive_columns`]. Fitting, dataset replay and single-record inference all
//! go through it, so there is exactly one definition of every feature.

use crate::data::HouseRecord;

/// Derived numeric columns, in derivation order.
pub const NUMERIC_FEATURES: [&str; 6] = [
    "sqft",
    "bedrooms",
    "bathrooms",
    "age",
    "bed_bath_ratio",
    "sqft_per_room",
];

/// Derived categorical columns, in derivation order.
pub const CATEGORICAL_FEATURES: [&str; 4] = [
    "location",
    "condition",
    "age_bucket",
    "location_condition",
];

/// Position of a derived column in the output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Numeric(usize),
    Categorical(usize),
}

/// Output layout: base numerics, base categoricals, then engineered columns.
pub const LAYOUT: [Slot; 10] = [
    Slot::Numeric(0),
    Slot::Numeric(1),
    Slot::Numeric(2),
    Slot::Numeric(3),
    Slot::Categorical(0),
    Slot::Categorical(1),
    Slot::Numeric(4),
    Slot::Numeric(5),
    Slot::Categorical(2),
    Slot::Categorical(3),
];

/// Engineered, not yet scaled or encoded, columns of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumns {
    pub numeric: [f64; NUMERIC_FEATURES.len()],
    pub categorical: [String; CATEGORICAL_FEATURES.len()],
}

/// Age bucket boundaries (upper bound exclusive).
const AGE_BUCKETS: [(f64, &str); 3] = [(10.0, "new"), (30.0, "modern"), (60.0, "established")];

pub fn age_bucket(age: f64) -> &'static str {
    AGE_BUCKETS
        .iter()
        .find(|(upper, _)| age < *upper)
        .map_or("historic", |(_, name)| *name)
}

/// Derive the engineered columns of one record.
///
/// `reference_year` is the year ages are measured from. It is fixed at fit
/// time and replayed from the fitted state afterwards.
pub fn derive_columns(record: &HouseRecord, reference_year: i32) -> DerivedColumns {
    let bedrooms = f64::from(record.bedrooms);
    let age = f64::from(reference_year) - f64::from(record.year_built);
    let bed_bath_ratio = if record.bathrooms > 0.0 {
        bedrooms / record.bathrooms
    } else {
        0.0
    };
    let rooms = bedrooms + record.bathrooms;
    let sqft_per_room = if rooms > 0.0 {
        record.sqft / rooms
    } else {
        record.sqft
    };

    DerivedColumns {
        numeric: [
            record.sqft,
            bedrooms,
            record.bathrooms,
            age,
            bed_bath_ratio,
            sqft_per_room,
        ],
        categorical: [
            record.location.clone(),
            record.condition.clone(),
            age_bucket(age).to_string(),
            format!("{}:{}", record.location, record.condition),
        ],
    }
}
