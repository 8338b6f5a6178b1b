//! Core types for the pipeline orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::deface::WorkerReport;
use crate::logging::RunLogger;

/// Name of the directory-snapshot artifact inside the session root.
pub const TREE_LOG_FILE: &str = "tree.log";

/// Name of the validator-report artifact inside the session root.
pub const VALIDATOR_LOG_FILE: &str = "validator.log";

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to pipeline steps.
///
/// Contains the session root and shared resources that steps can read
/// but not modify. Mutable state goes in `RunState`.
pub struct Context {
    /// Session root directory the run operates on.
    pub root: PathBuf,
    /// Application settings.
    pub settings: Settings,
    /// Run name/identifier (derived from the root directory).
    pub run_name: String,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a run.
    pub fn new(
        root: PathBuf,
        settings: Settings,
        run_name: impl Into<String>,
        logger: Arc<RunLogger>,
    ) -> Self {
        Self {
            root,
            settings,
            run_name: run_name.into(),
            logger,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// The `bids/` directory under the session root.
    pub fn bids_dir(&self) -> PathBuf {
        self.root.join("bids")
    }

    /// Path of the `tree.log` artifact.
    pub fn tree_log_path(&self) -> PathBuf {
        self.root.join(TREE_LOG_FILE)
    }

    /// Path of the `validator.log` artifact.
    pub fn validator_log_path(&self) -> PathBuf {
        self.root.join(VALIDATOR_LOG_FILE)
    }
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Steps add new data but should not overwrite existing values; each
/// step's output is stored in its own section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: Option<String>,
    /// Dataset name from `finalized.json` (metadata-driven variant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    /// Resolved BIDS target directory (set by the reset step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
    /// Defacing fan-out results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deface: Option<DefaceOutput>,
    /// Conversion results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert: Option<ConvertOutput>,
    /// Directory snapshot results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotOutput>,
    /// Validation results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutput>,
}

impl RunState {
    /// Create a new run state with the given ID.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// The resolved target directory, if the reset step has run.
    pub fn target(&self) -> Option<&PathBuf> {
        self.target_dir.as_ref()
    }

    /// Check if conversion has completed.
    pub fn has_conversion(&self) -> bool {
        self.convert.is_some()
    }
}

/// Output from the Deface step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaceOutput {
    /// Path of the manifest that drove the fan-out.
    pub manifest_path: PathBuf,
    /// Path of the sentinel log that collected worker output.
    pub sentinel_path: PathBuf,
    /// Number of records attempted.
    pub attempted: usize,
    /// Number of failed invocations.
    pub failed: usize,
    /// Per-record worker reports, in manifest order.
    pub reports: Vec<WorkerReport>,
}

/// Output from the Convert step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOutput {
    /// Converter exit code.
    pub exit_code: i32,
    /// Converter command that was run.
    pub command: String,
}

/// Output from the Snapshot step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOutput {
    /// Path of the written `tree.log`.
    pub log_path: PathBuf,
    /// Tree lister exit code (-1 if it could not be spawned).
    pub lister_exit_code: i32,
}

/// Output from the Validate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutput {
    /// Path of the written `validator.log`.
    pub log_path: PathBuf,
    /// Validator exit code (-1 if it could not be spawned).
    pub exit_code: i32,
    /// Whether the validator reported a clean dataset.
    pub passed: bool,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_tracks_completion() {
        let mut state = RunState::new("session_01");
        assert!(!state.has_conversion());

        state.convert = Some(ConvertOutput {
            exit_code: 0,
            command: "./convert.js /data/session_01".to_string(),
        });

        assert!(state.has_conversion());
    }

    #[test]
    fn run_state_serializes() {
        let state = RunState::new("session_02");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"run_id\":\"session_02\""));
        // Unset sections are omitted
        assert!(!json.contains("deface"));
    }
}
