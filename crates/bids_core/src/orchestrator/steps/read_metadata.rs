//! Step that reads the dataset name from `finalized.json`.

use crate::metadata::{self, FINALIZED_FILE};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Reads and validates the dataset name before anything destructive
/// happens. The name selects the output directory `bids/<name>`, so a
/// missing or malformed descriptor aborts the run with no side effects.
pub struct ReadMetadataStep;

impl PipelineStep for ReadMetadataStep {
    fn name(&self) -> &str {
        "ReadMetadata"
    }

    fn validate_input(&self, ctx: &Context, _state: &RunState) -> StepResult<()> {
        let path = ctx.root.join(FINALIZED_FILE);
        if !path.exists() {
            return Err(StepError::metadata(path, "descriptor not found"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let name = metadata::read_dataset_name(&ctx.root)
            .map_err(|e| StepError::metadata(ctx.root.join(FINALIZED_FILE), e.to_string()))?;

        ctx.logger.info(&format!("Dataset name: {}", name));
        state.dataset_name = Some(name);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.dataset_name.is_none() {
            return Err(StepError::invalid_output("dataset name was not recorded"));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Read dataset name from the finalized descriptor"
    }
}
