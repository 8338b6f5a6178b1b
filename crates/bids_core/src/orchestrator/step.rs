//! Pipeline step trait definition.
//!
//! All pipeline steps implement this trait, providing a consistent
//! interface for validation, execution, and failure policy.

use super::errors::StepResult;
use super::types::{Context, RunState, StepOutcome};

/// Trait for pipeline steps.
///
/// Each step in the pipeline implements this trait. The pipeline runner
/// calls these methods in order:
///
/// 1. `validate_input` - Check preconditions before execution
/// 2. `execute` - Perform the step's work
/// 3. `validate_output` - Verify the step produced valid output
///
/// The shell scripts this pipeline descends from relied on `set -e`
/// for control flow; here every step declares its failure policy
/// explicitly instead. A step whose `fatal()` is false has its errors
/// recorded without aborting the run, and a step whose
/// `runs_after_failure()` is true still executes after a fatal error so
/// audit artifacts reflect best-effort state.
pub trait PipelineStep: Send + Sync {
    /// Get the step name (for logging and error context).
    fn name(&self) -> &str;

    /// Validate inputs before execution.
    ///
    /// Should check that all required preconditions are met (files
    /// exist, previous steps recorded their output, etc.).
    fn validate_input(&self, ctx: &Context, state: &RunState) -> StepResult<()>;

    /// Execute the step's main work.
    ///
    /// Should perform the step's processing and record results in
    /// `state`. Use `ctx.logger` for logging and `ctx.report_progress()`
    /// for progress.
    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome>;

    /// Validate outputs after execution.
    ///
    /// Called after `execute` returns `Success`. Should verify that the
    /// step produced valid output (files exist, state populated, etc.).
    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()>;

    /// Whether an error from this step aborts the pipeline.
    ///
    /// Non-fatal steps (snapshot, validation) have their errors
    /// recorded in the run result instead.
    fn fatal(&self) -> bool {
        true
    }

    /// Whether this step still runs once a fatal error is pending.
    ///
    /// Audit steps consult `state` so `tree.log` and `validator.log`
    /// are refreshed after a conversion failure, but stay untouched
    /// when the run aborted before anything was mutated.
    fn runs_after_failure(&self, _state: &RunState) -> bool {
        false
    }

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
