//! Transformer store: durable save/load of a [`FittedTransformerState`].

use crate::artifact::{read_versioned, write_versioned};
use crate::error::MlError;
use crate::features::state::FittedTransformerState;
use std::path::Path;

/// Version of the transformer artifact layout. Bump whenever derivation,
/// scaling or encoding changes meaning, so stale artifacts are rejected.
pub const FORMAT_VERSION: u32 = 1;

const PAYLOAD_KEY: &str = "state";

/// Write `state` to `destination` atomically.
pub fn save(state: &FittedTransformerState, destination: &Path) -> Result<(), MlError> {
    write_versioned(destination, FORMAT_VERSION, PAYLOAD_KEY, state)?;
    tracing::info!(
        path = %destination.display(),
        version = FORMAT_VERSION,
        columns = state.output_columns.len(),
        "Saved transformer state"
    );
    Ok(())
}

/// Read a state written by [`save`], rejecting other versions and states the
/// current derivation cannot replay.
pub fn load(source: &Path) -> Result<FittedTransformerState, MlError> {
    let state: FittedTransformerState = read_versioned(source, FORMAT_VERSION, PAYLOAD_KEY)?;
    state
        .check_consistency()
        .map_err(|reason| MlError::corrupt(source, reason))?;
    tracing::debug!(path = %source.display(), "Loaded transformer state");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HouseRecord;
    use crate::features::FeatureTransformer;
    use homeval_core::FeatureConfig;
    use pretty_assertions::assert_eq;

    fn state() -> FittedTransformerState {
        let records = [
            HouseRecord {
                sqft: 1200.0,
                bedrooms: 2,
                bathrooms: 1.0,
                location: "Urban".into(),
                year_built: 1980,
                condition: "Fair".into(),
                price: Some(250000.0),
            },
            HouseRecord {
                sqft: 2400.0,
                bedrooms: 4,
                bathrooms: 2.5,
                location: "Suburban".into(),
                year_built: 2010,
                condition: "Good".into(),
                price: Some(480000.0),
            },
        ];
        FeatureTransformer::new(&FeatureConfig::default())
            .with_reference_year(2024)
            .fit_state(&records)
            .unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("models").join("preprocessor.json");
        let state = state();
        save(&state, &path).unwrap();
        assert_eq!(load(&path).unwrap(), state);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MlError::NotFound(_)));
    }

    #[test]
    fn test_missing_version_marker() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("old.json");
        let legacy = serde_json::json!({ "state": state() });
        std::fs::write(&path, legacy.to_string()).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, MlError::ArtifactVersion { found: None, .. }));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{\"format_version\": 1, \"state\": ").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, MlError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_inconsistent_state_is_corrupt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("preprocessor.json");
        let mut state = state();
        state.output_columns.swap(0, 1);
        save(&state, &path).unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("output column order"));
    }
}
