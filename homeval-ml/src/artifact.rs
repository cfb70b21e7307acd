//! Versioned, checksummed JSON artifacts.
//!
//! Layout on disk:
//!
//! ```json
//! { "format_version": 1, "created_at": "...", "checksum": "<sha256>", "<key>": { ... } }
//! ```
//!
//! The checksum covers the canonical JSON of the payload (object keys sorted).
//! The version marker is checked before anything else is interpreted.

use crate::error::MlError;
use chrono::Utc;
use homeval_core::persistence::atomic_write;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

fn checksum(payload: &Value) -> Result<String, MlError> {
    let canonical = serde_json::to_vec(payload)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

/// Serialize `payload` under `key` and write it atomically.
pub(crate) fn write_versioned<T: Serialize>(
    path: &Path,
    version: u32,
    key: &str,
    payload: &T,
) -> Result<(), MlError> {
    let payload = serde_json::to_value(payload)?;
    let mut envelope = serde_json::Map::new();
    envelope.insert("format_version".into(), Value::from(version));
    envelope.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    envelope.insert("checksum".into(), Value::String(checksum(&payload)?));
    envelope.insert(key.into(), payload);
    let bytes = serde_json::to_vec_pretty(&Value::Object(envelope))?;
    atomic_write(path, &bytes)?;
    Ok(())
}

/// Read an artifact written by [`write_versioned`].
pub(crate) fn read_versioned<T: DeserializeOwned>(
    path: &Path,
    expected: u32,
    key: &str,
) -> Result<T, MlError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MlError::not_found(format!("artifact {}", path.display())));
        }
        Err(e) => return Err(e.into()),
    };
    let root: Value = serde_json::from_slice(&bytes)
        .map_err(|e| MlError::corrupt(path, format!("not valid JSON: {e}")))?;
    let Value::Object(mut envelope) = root else {
        return Err(MlError::corrupt(path, "top level is not an object"));
    };

    let found = envelope.get("format_version").and_then(Value::as_u64);
    if found != Some(u64::from(expected)) {
        return Err(MlError::ArtifactVersion {
            path: path.to_path_buf(),
            found,
            expected,
        });
    }

    let payload = envelope
        .remove(key)
        .ok_or_else(|| MlError::corrupt(path, format!("missing '{key}'")))?;
    let stored = envelope
        .get("checksum")
        .and_then(Value::as_str)
        .ok_or_else(|| MlError::corrupt(path, "missing checksum"))?;
    if stored != checksum(&payload)? {
        return Err(MlError::corrupt(path, "checksum mismatch"));
    }

    serde_json::from_value(payload)
        .map_err(|e| MlError::corrupt(path, format!("invalid '{key}': {e}")))
}
