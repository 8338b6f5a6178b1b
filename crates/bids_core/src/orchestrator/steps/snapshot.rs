//! Step that captures the output tree into `tree.log`.

use std::fs;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, SnapshotOutput, StepOutcome};
use crate::process::run_tool;

/// Writes the tree lister's output over `tree.log` so the artifact
/// always reflects the latest run, even after a conversion failure.
/// Runs that aborted before the output reset leave the previous
/// snapshot in place. The lister's own exit code is recorded but
/// never fatal.
pub struct SnapshotStep;

impl PipelineStep for SnapshotStep {
    fn name(&self) -> &str {
        "Snapshot"
    }

    fn validate_input(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let target = state.target().cloned().unwrap_or_else(|| ctx.bids_dir());
        let lister = &ctx.settings.tools.tree;
        let log_path = ctx.tree_log_path();

        ctx.logger
            .command(&lister.command_line(std::slice::from_ref(&target)));

        let (content, exit_code) = match run_tool(lister, std::slice::from_ref(&target)) {
            Ok(out) => {
                if !out.success() {
                    ctx.logger.warn(&format!(
                        "tree lister exited with code {}",
                        out.exit_code
                    ));
                }
                (out.combined(), out.exit_code)
            }
            Err(e) => {
                let message = format!("tree lister failed to start: {}\n", e);
                ctx.logger.warn(message.trim());
                (message.into_bytes(), -1)
            }
        };

        fs::write(&log_path, content)
            .map_err(|e| StepError::io_error(format!("writing {}", log_path.display()), e))?;

        state.snapshot = Some(SnapshotOutput {
            log_path,
            lister_exit_code: exit_code,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &RunState) -> StepResult<()> {
        if !ctx.tree_log_path().exists() {
            return Err(StepError::invalid_output("tree.log was not written"));
        }
        Ok(())
    }

    fn fatal(&self) -> bool {
        false
    }

    // Only audit a run that reached the destructive phase; an earlier
    // abort must not clobber the last run's artifact.
    fn runs_after_failure(&self, state: &RunState) -> bool {
        state.target().is_some()
    }

    fn description(&self) -> &str {
        "Snapshot the output tree into tree.log"
    }
}
