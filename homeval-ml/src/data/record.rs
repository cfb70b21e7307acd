//! Typed housing records.

use crate::data::schema::{SchemaError, SchemaIssue, parse_float, parse_integer};
use crate::data::source::DataBatch;
use serde::{Deserialize, Serialize};

/// Raw-record field names in file order.
pub const RAW_FIELDS: [&str; 6] = [
    "sqft",
    "bedrooms",
    "bathrooms",
    "location",
    "year_built",
    "condition",
];

/// One housing sample as read from disk. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub sqft: Option<f64>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<f64>,
    pub location: Option<String>,
    pub year_built: Option<i64>,
    pub condition: Option<String>,
    pub price: Option<f64>,
}

/// A complete housing sample: every field satisfies its type. Domain
/// constraints are enforced by the cleaning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseRecord {
    pub sqft: f64,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub location: String,
    pub year_built: i32,
    pub condition: String,
    /// Target value; absent at inference time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl HouseRecord {
    /// Cells in [`RAW_FIELDS`] order, followed by the target when requested.
    pub fn to_cells(&self, with_target: bool) -> Vec<String> {
        let mut cells = vec![
            self.sqft.to_string(),
            self.bedrooms.to_string(),
            self.bathrooms.to_string(),
            self.location.clone(),
            self.year_built.to_string(),
            self.condition.clone(),
        ];
        if with_target {
            cells.push(self.price.map(|p| p.to_string()).unwrap_or_default());
        }
        cells
    }
}

/// Column positions of the raw fields inside a batch.
#[derive(Debug, Clone, Copy)]
pub struct RawColumns {
    fields: [usize; 6],
    target: Option<usize>,
}

impl RawColumns {
    /// Locate every raw field; the target is optional.
    pub fn resolve(batch: &DataBatch, target: &str) -> Result<Self, SchemaError> {
        let mut fields = [0usize; 6];
        let mut issues = Vec::new();
        for (slot, name) in fields.iter_mut().zip(RAW_FIELDS) {
            match batch.column_index(name) {
                Some(idx) => *slot = idx,
                None => issues.push(SchemaIssue::MissingColumn {
                    column: name.to_string(),
                }),
            }
        }
        if !issues.is_empty() {
            return Err(issues.into());
        }
        Ok(Self {
            fields,
            target: batch.column_index(target),
        })
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Read one row. Cells that are null or fail to parse come back as `None`;
    /// run the schema validator first to tell the two apart.
    pub fn read(&self, batch: &DataBatch, row: usize) -> RawRecord {
        let [sqft, bedrooms, bathrooms, location, year_built, condition] = self.fields;
        let text = |col: usize| batch.text(row, col);
        RawRecord {
            sqft: text(sqft).and_then(parse_float),
            bedrooms: text(bedrooms).and_then(parse_integer),
            bathrooms: text(bathrooms).and_then(parse_float),
            location: text(location).map(|s| s.trim().to_string()),
            year_built: text(year_built).and_then(parse_integer),
            condition: text(condition).map(|s| s.trim().to_string()),
            price: self.target.and_then(text).and_then(parse_float),
        }
    }
}

impl RawRecord {
    /// Name of the first missing feature field, if any.
    pub fn first_missing(&self) -> Option<&'static str> {
        let present = [
            self.sqft.is_some(),
            self.bedrooms.is_some(),
            self.bathrooms.is_some(),
            self.location.as_deref().is_some_and(|s| !s.is_empty()),
            self.year_built.is_some(),
            self.condition.as_deref().is_some_and(|s| !s.is_empty()),
        ];
        RAW_FIELDS
            .iter()
            .zip(present)
            .find(|(_, ok)| !ok)
            .map(|(name, _)| *name)
    }

    /// Convert to a typed record. Fails with the offending field name when a
    /// field is missing or does not fit the typed record (negative bedroom
    /// count, year outside `i32`).
    pub fn complete(self) -> Result<HouseRecord, &'static str> {
        if let Some(field) = self.first_missing() {
            return Err(field);
        }
        let bedrooms = self
            .bedrooms
            .and_then(|b| u32::try_from(b).ok())
            .ok_or("bedrooms")?;
        let year_built = self
            .year_built
            .and_then(|y| i32::try_from(y).ok())
            .ok_or("year_built")?;
        Ok(HouseRecord {
            sqft: self.sqft.ok_or("sqft")?,
            bedrooms,
            bathrooms: self.bathrooms.ok_or("bathrooms")?,
            location: self.location.ok_or("location")?,
            year_built,
            condition: self.condition.ok_or("condition")?,
            price: self.price,
        })
    }
}
