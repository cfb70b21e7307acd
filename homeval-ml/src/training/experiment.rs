//! Local experiment tracking.
//!
//! Each run is one JSON file under `<tracking_dir>/runs/`, rewritten
//! atomically whenever the run changes state. Runs never share a file, so
//! concurrent training runs cannot clobber each other's records.

use crate::error::MlError;
use crate::training::metrics::RegressionMetrics;
use chrono::{DateTime, Utc};
use homeval_core::persistence::{atomic_write_json, load_json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One tracked training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    pub id: String,
    pub name: String,
    pub status: RunStatus,
    pub params: BTreeMap<String, serde_json::Value>,
    pub metrics: Option<RegressionMetrics>,
    /// Artifact role (`model`, `preprocessor`, ...) → path.
    pub artifacts: BTreeMap<String, PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File-backed run log.
#[derive(Debug, Clone)]
pub struct ExperimentTracker {
    runs_dir: PathBuf,
}

impl ExperimentTracker {
    pub fn new(tracking_dir: &Path) -> Self {
        Self {
            runs_dir: tracking_dir.join("runs"),
        }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.runs_dir.join(format!("{id}.json"))
    }

    fn write(&self, run: &ExperimentRun) -> Result<(), MlError> {
        atomic_write_json(&self.path(&run.id), run)?;
        Ok(())
    }

    /// Record a new run in the `running` state.
    pub fn start_run(
        &self,
        name: &str,
        params: BTreeMap<String, serde_json::Value>,
    ) -> Result<ExperimentRun, MlError> {
        let now = Utc::now();
        let run = ExperimentRun {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: RunStatus::Running,
            params,
            metrics: None,
            artifacts: BTreeMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.write(&run)?;
        tracing::info!(run_id = %run.id, name, "Started experiment run");
        Ok(run)
    }

    pub fn complete(
        &self,
        run: &mut ExperimentRun,
        metrics: RegressionMetrics,
        artifacts: BTreeMap<String, PathBuf>,
    ) -> Result<(), MlError> {
        run.status = RunStatus::Completed;
        run.metrics = Some(metrics);
        run.artifacts.extend(artifacts);
        run.updated_at = Utc::now();
        self.write(run)?;
        tracing::info!(run_id = %run.id, "Completed experiment run");
        Ok(())
    }

    pub fn fail(&self, run: &mut ExperimentRun, error: &str) -> Result<(), MlError> {
        run.status = RunStatus::Failed;
        run.error = Some(error.to_string());
        run.updated_at = Utc::now();
        self.write(run)?;
        tracing::warn!(run_id = %run.id, error, "Experiment run failed");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<ExperimentRun, MlError> {
        load_json(&self.path(id))?.ok_or_else(|| MlError::not_found(format!("run {id}")))
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<ExperimentRun>, MlError> {
        let mut runs = Vec::new();
        if !self.runs_dir.exists() {
            return Ok(runs);
        }
        for entry in std::fs::read_dir(&self.runs_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(run) = load_json::<ExperimentRun>(&path)? {
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics() -> RegressionMetrics {
        RegressionMetrics::compute(&[1.0, 2.0], &[1.5, 2.0]).unwrap()
    }

    #[test]
    fn test_run_lifecycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        let params = BTreeMap::from([("alpha".to_string(), serde_json::json!(1.0))]);
        let mut run = tracker.start_run("house_price_model", params).unwrap();
        assert_eq!(tracker.get(&run.id).unwrap().status, RunStatus::Running);

        let artifacts = BTreeMap::from([("model".to_string(), PathBuf::from("m.json"))]);
        tracker.complete(&mut run, metrics(), artifacts).unwrap();

        let stored = tracker.get(&run.id).unwrap();
        assert_eq!(stored, run);
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.artifacts["model"], PathBuf::from("m.json"));
    }

    #[test]
    fn test_failed_run_keeps_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        let mut run = tracker.start_run("m", BTreeMap::new()).unwrap();
        tracker.fail(&mut run, "singular").unwrap();
        let stored = tracker.get(&run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("singular"));
    }

    #[test]
    fn test_list_runs_newest_first() {
        let dir = tempfile::TempDir::new().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        assert!(tracker.list_runs().unwrap().is_empty());
        let first = tracker.start_run("a", BTreeMap::new()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = tracker.start_run("b", BTreeMap::new()).unwrap();
        let ids: Vec<String> = tracker.list_runs().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_unknown_run_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let tracker = ExperimentTracker::new(dir.path());
        assert!(matches!(tracker.get("nope"), Err(MlError::NotFound(_))));
    }
}
