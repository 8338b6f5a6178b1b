//! Step that removes the previous conversion output.

use std::fs;
use std::io;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

/// Deletes the BIDS output directory so the converter starts from a
/// clean slate. With a dataset name recorded the target is
/// `bids/<name>`; otherwise the whole `bids/` directory goes. An
/// already-absent target is not an error.
pub struct ResetOutputStep;

impl PipelineStep for ResetOutputStep {
    fn name(&self) -> &str {
        "ResetOutput"
    }

    fn validate_input(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let target = match &state.dataset_name {
            Some(name) => ctx.bids_dir().join(name),
            None => ctx.bids_dir(),
        };

        ctx.logger
            .info(&format!("Removing previous output: {}", target.display()));

        match fs::remove_dir_all(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ctx.logger.info("No previous output to remove");
            }
            Err(e) => {
                return Err(StepError::io_error(
                    format!("removing {}", target.display()),
                    e,
                ));
            }
        }

        state.target_dir = Some(target);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        match state.target() {
            Some(target) if target.exists() => Err(StepError::invalid_output(format!(
                "{} still exists after removal",
                target.display()
            ))),
            Some(_) => Ok(()),
            None => Err(StepError::invalid_output("target directory not recorded")),
        }
    }

    fn description(&self) -> &str {
        "Delete the previous BIDS output directory"
    }
}
