//! Pipeline runner that executes steps in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, RunState, StepOutcome};

/// Pipeline that runs a sequence of steps.
///
/// Steps execute in strict declared order with validation before and
/// after each step. Failure handling follows each step's declared
/// policy: a fatal error becomes *pending* and is returned once the
/// remaining `runs_after_failure` steps (the audit steps) have been
/// attempted; non-fatal errors are recorded in the run result and the
/// pipeline proceeds.
pub struct Pipeline {
    /// Steps to execute in order.
    steps: Vec<Box<dyn PipelineStep>>,
    /// Cancellation flag.
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Share the cancellation flag of an existing handle.
    pub fn with_cancel_handle(mut self, handle: &CancelHandle) -> Self {
        self.cancelled = Arc::clone(&handle.flag);
        self
    }

    /// Get a cancellation handle.
    ///
    /// Call `cancel()` on the returned handle to stop the pipeline
    /// at the next step boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Check if pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Returns the run result on success. On failure the first fatal
    /// error is returned, after the audit steps have been attempted.
    pub fn run(&self, ctx: &Context, state: &mut RunState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
            steps_failed: Vec::new(),
        };
        let mut pending: Option<PipelineError> = None;

        let total_steps = self.steps.len();

        for (i, step) in self.steps.iter().enumerate() {
            // Cancellation wins over a pending fatal error: the
            // operator asked us to stop producing side effects.
            if self.is_cancelled() {
                ctx.logger
                    .warn(&format!("Pipeline cancelled before step '{}'", step.name()));
                return Err(PipelineError::cancelled(&ctx.run_name));
            }

            let step_name = step.name();

            if pending.is_some() && !step.runs_after_failure(state) {
                ctx.logger.info(&format!(
                    "Skipping '{}' after earlier fatal error",
                    step_name
                ));
                result.steps_skipped.push(step_name.to_string());
                continue;
            }

            ctx.logger.phase(step_name);

            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));

            // Validate input
            ctx.logger
                .debug(&format!("Validating input for '{}'", step_name));
            if let Err(e) = step.validate_input(ctx, state) {
                self.record_failure(ctx, step.as_ref(), e, &mut result, &mut pending);
                continue;
            }

            // Execute
            ctx.logger.debug(&format!("Executing '{}'", step_name));
            let outcome = match step.execute(ctx, state) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.record_failure(ctx, step.as_ref(), e, &mut result, &mut pending);
                    continue;
                }
            };

            match outcome {
                StepOutcome::Success => {
                    // Validate output
                    ctx.logger
                        .debug(&format!("Validating output for '{}'", step_name));
                    if let Err(e) = step.validate_output(ctx, state) {
                        self.record_failure(ctx, step.as_ref(), e, &mut result, &mut pending);
                        continue;
                    }

                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger
                        .info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        if let Some(err) = pending {
            return Err(err);
        }

        ctx.report_progress("Complete", 100, "Pipeline finished");
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    /// Apply a step's failure policy to an error.
    fn record_failure(
        &self,
        ctx: &Context,
        step: &dyn PipelineStep,
        error: StepError,
        result: &mut PipelineRunResult,
        pending: &mut Option<PipelineError>,
    ) {
        let step_name = step.name();
        if step.fatal() {
            ctx.logger
                .error(&format!("{} failed: {}", step_name, error));
            if pending.is_none() {
                *pending = Some(PipelineError::step_failed(&ctx.run_name, step_name, error));
            }
        } else {
            ctx.logger
                .warn(&format!("{} failed (non-fatal): {}", step_name, error));
            result
                .steps_failed
                .push((step_name.to_string(), error.to_string()));
        }
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for cancelling a running pipeline.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a fresh handle, to be attached with `with_cancel_handle`.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the pipeline.
    ///
    /// The pipeline will stop at the next step boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
    /// Non-fatal step failures (step name, error message).
    pub steps_failed: Vec<(String, String)>,
}

impl PipelineRunResult {
    /// Check if every step completed (none skipped or failed).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty() && self.steps_failed.is_empty()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len() + self.steps_failed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    fn test_context(root: &std::path::Path) -> Context {
        let logger = RunLogger::create(root, LogConfig::default(), None).unwrap();
        Context::new(
            root.to_path_buf(),
            Settings::default(),
            "test_run",
            Arc::new(logger),
        )
    }

    struct CountingStep {
        name: &'static str,
        execute_count: Arc<AtomicUsize>,
        fail: bool,
        fatal: bool,
        after_failure: bool,
    }

    impl CountingStep {
        fn ok(name: &'static str, count: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                execute_count: Arc::clone(count),
                fail: false,
                fatal: true,
                after_failure: false,
            }
        }

        fn failing(name: &'static str, count: &Arc<AtomicUsize>, fatal: bool) -> Self {
            Self {
                name,
                execute_count: Arc::clone(count),
                fail: true,
                fatal,
                after_failure: false,
            }
        }

        fn audit(name: &'static str, count: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                execute_count: Arc::clone(count),
                fail: false,
                fatal: false,
                after_failure: true,
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context, _state: &RunState) -> Result<(), StepError> {
            Ok(())
        }

        fn execute(
            &self,
            _ctx: &Context,
            _state: &mut RunState,
        ) -> Result<StepOutcome, StepError> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StepError::other("induced failure"))
            } else {
                Ok(StepOutcome::Success)
            }
        }

        fn validate_output(&self, _ctx: &Context, _state: &RunState) -> Result<(), StepError> {
            Ok(())
        }

        fn fatal(&self) -> bool {
            self.fatal
        }

        fn runs_after_failure(&self, _state: &RunState) -> bool {
            self.after_failure
        }
    }

    #[test]
    fn pipeline_builds_correctly() {
        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("Step1", &count))
            .with_step(CountingStep::ok("Step2", &count));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn runs_all_steps_in_order() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = RunState::new("t");

        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("A", &count))
            .with_step(CountingStep::ok("B", &count));

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(result.steps_completed, vec!["A", "B"]);
        assert!(result.all_completed());
    }

    #[test]
    fn fatal_failure_skips_normal_steps_but_runs_audit_steps() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = RunState::new("t");

        let count = Arc::new(AtomicUsize::new(0));
        let audit_count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::failing("Convert", &count, true))
            .with_step(CountingStep::ok("Never", &count))
            .with_step(CountingStep::audit("Snapshot", &audit_count));

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { .. }));
        // Convert ran, Never skipped, Snapshot ran
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(audit_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_fatal_failure_is_recorded_and_run_succeeds() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = RunState::new("t");

        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::failing("Validate", &count, false))
            .with_step(CountingStep::ok("After", &count));

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(result.steps_failed.len(), 1);
        assert_eq!(result.steps_failed[0].0, "Validate");
        assert_eq!(result.steps_completed, vec!["After"]);
    }

    #[test]
    fn first_fatal_error_wins() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = RunState::new("t");

        struct FailingAudit;
        impl PipelineStep for FailingAudit {
            fn name(&self) -> &str {
                "Audit"
            }
            fn validate_input(&self, _: &Context, _: &RunState) -> Result<(), StepError> {
                Ok(())
            }
            fn execute(&self, _: &Context, _: &mut RunState) -> Result<StepOutcome, StepError> {
                Err(StepError::other("audit also failed"))
            }
            fn validate_output(&self, _: &Context, _: &RunState) -> Result<(), StepError> {
                Ok(())
            }
            fn fatal(&self) -> bool {
                false
            }
            fn runs_after_failure(&self, _: &RunState) -> bool {
                true
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::failing("Convert", &count, true))
            .with_step(FailingAudit);

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Convert"), "{msg}");
    }

    #[test]
    fn cancel_handle_works() {
        let pipeline = Pipeline::new();
        let handle = pipeline.cancel_handle();

        assert!(!pipeline.is_cancelled());
        assert!(!handle.is_cancelled());

        handle.cancel();

        assert!(pipeline.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn cancelled_pipeline_stops_at_step_boundary() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = RunState::new("t");

        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new().with_step(CountingStep::ok("A", &count));
        pipeline.cancel_handle().cancel();

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
