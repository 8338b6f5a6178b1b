//! Pipeline orchestration for finalize-and-convert runs.
//!
//! A run executes a fixed step sequence over one session root. Two
//! sequences exist, selected by [`PipelineVariant`](crate::config::PipelineVariant):
//!
//! - Metadata-driven: ReadMetadata → ResetOutput → Convert → Snapshot
//!   → Validate. The dataset name from `finalized.json` selects the
//!   output directory `bids/<name>`.
//! - Manifest-driven: ResetOutput → Deface → Convert → Snapshot →
//!   Validate. Files listed in `deface_list.txt` are defaced by a
//!   bounded worker pool before conversion into `bids/`.
//!
//! Both sequences share the audit tail: `tree.log` and `validator.log`
//! are produced even when conversion failed, and validator findings
//! never fail a run.

pub mod errors;
pub mod pipeline;
pub mod runner;
pub mod step;
pub mod steps;
pub mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use runner::SessionRunner;
pub use step::PipelineStep;
pub use types::{
    Context, ConvertOutput, DefaceOutput, ProgressCallback, RunState, SnapshotOutput,
    StepOutcome, ValidationOutput, TREE_LOG_FILE, VALIDATOR_LOG_FILE,
};

use serde::{Deserialize, Serialize};

use crate::config::PipelineVariant;
use steps::{ConvertStep, DefaceStep, ReadMetadataStep, ResetOutputStep, SnapshotStep, ValidateStep};

/// Build the metadata-driven step sequence.
pub fn create_metadata_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ReadMetadataStep)
        .with_step(ResetOutputStep)
        .with_step(ConvertStep)
        .with_step(SnapshotStep)
        .with_step(ValidateStep)
}

/// Build the manifest-driven step sequence.
pub fn create_manifest_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ResetOutputStep)
        .with_step(DefaceStep)
        .with_step(ConvertStep)
        .with_step(SnapshotStep)
        .with_step(ValidateStep)
}

/// Build the step sequence for a variant.
pub fn create_pipeline(variant: PipelineVariant) -> Pipeline {
    match variant {
        PipelineVariant::MetadataDriven => create_metadata_pipeline(),
        PipelineVariant::ManifestDriven => create_manifest_pipeline(),
    }
}

/// Summary of a completed run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Run name (the session root's directory name).
    pub run_name: String,
    /// Whether the run completed without a fatal error.
    pub success: bool,
    /// Steps that completed.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
    /// Non-fatal step failures (step name, error message).
    pub steps_failed: Vec<(String, String)>,
    /// Whether the validator reported a clean dataset, if it ran.
    pub validation_passed: Option<bool>,
    /// Number of failed defacer invocations.
    pub deface_failures: usize,
    /// Final run state with per-step outputs.
    pub state: RunState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_pipeline_has_expected_steps() {
        let pipeline = create_metadata_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec!["ReadMetadata", "ResetOutput", "Convert", "Snapshot", "Validate"]
        );
    }

    #[test]
    fn manifest_pipeline_defaces_before_conversion() {
        let pipeline = create_manifest_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec!["ResetOutput", "Deface", "Convert", "Snapshot", "Validate"]
        );
    }
}
