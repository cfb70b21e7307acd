//! Data stage: delimited-file I/O, schema validation, typed records, cleaning.

pub mod clean;
pub mod record;
pub mod schema;
pub mod source;

pub use clean::{CleanedDataset, CleaningReport, DropReason, clean, clean_with_year};
pub use record::{HouseRecord, RawColumns, RawRecord};
pub use schema::{
    ColumnSchema, ColumnType, SchemaDefinition, SchemaError, SchemaIssue, validate_batch,
    validate_record,
};
pub use source::{DataBatch, parse_csv, read_csv, write_csv};
