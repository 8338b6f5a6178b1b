//! Step that runs the BIDS validator and captures its report.

use std::fs;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome, ValidationOutput};
use crate::process::run_tool;

/// Runs the validator against the output directory and writes its
/// report over `validator.log`. Validator findings are an advisory
/// artifact: a nonzero validator exit never fails the run.
pub struct ValidateStep;

impl PipelineStep for ValidateStep {
    fn name(&self) -> &str {
        "Validate"
    }

    fn validate_input(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let target = state.target().cloned().unwrap_or_else(|| ctx.bids_dir());
        let validator = &ctx.settings.tools.validator;
        let log_path = ctx.validator_log_path();

        ctx.logger
            .command(&validator.command_line(std::slice::from_ref(&target)));

        let (content, exit_code) = match run_tool(validator, std::slice::from_ref(&target)) {
            Ok(out) => {
                if out.success() {
                    ctx.logger.success("Validator reported a clean dataset");
                } else {
                    ctx.logger.info(&format!(
                        "Validator reported findings (exit code {})",
                        out.exit_code
                    ));
                }
                (out.combined(), out.exit_code)
            }
            Err(e) => {
                let message = format!("validator failed to start: {}\n", e);
                ctx.logger.warn(message.trim());
                (message.into_bytes(), -1)
            }
        };

        fs::write(&log_path, content)
            .map_err(|e| StepError::io_error(format!("writing {}", log_path.display()), e))?;

        state.validation = Some(ValidationOutput {
            log_path,
            exit_code,
            passed: exit_code == 0,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &RunState) -> StepResult<()> {
        if !ctx.validator_log_path().exists() {
            return Err(StepError::invalid_output("validator.log was not written"));
        }
        Ok(())
    }

    fn fatal(&self) -> bool {
        false
    }

    // Only audit a run that reached the destructive phase; an earlier
    // abort must not clobber the last run's report.
    fn runs_after_failure(&self, state: &RunState) -> bool {
        state.target().is_some()
    }

    fn description(&self) -> &str {
        "Run the BIDS validator and capture its report"
    }
}
