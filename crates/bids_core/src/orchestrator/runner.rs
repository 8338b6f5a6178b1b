//! Session runner: sets up a run and executes the selected pipeline.

use std::path::Path;
use std::sync::Arc;

use crate::config::{PipelineVariant, Settings};
use crate::lock::RunLock;
use crate::logging::{LogCallback, RunLogger};

use super::errors::{PipelineError, PipelineResult};
use super::pipeline::CancelHandle;
use super::types::{Context, ProgressCallback, RunState};
use super::{create_pipeline, RunReport};

/// Drives one pipeline run over a session root.
///
/// Acquires the per-root lock, creates the run log, builds the step
/// sequence for the configured variant, and executes it. Holds no
/// per-run state, so one runner can serve many roots.
pub struct SessionRunner {
    settings: Settings,
}

impl SessionRunner {
    /// Create a runner with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// The variant this runner will execute.
    pub fn variant(&self) -> PipelineVariant {
        self.settings.pipeline.variant
    }

    /// Run the pipeline over `root`.
    ///
    /// The lock is released when the run finishes, whatever the
    /// outcome. `log_callback` receives every run-log line;
    /// `progress` receives step-level progress; `cancel` stops the
    /// run at the next step boundary.
    pub fn run(
        &self,
        root: &Path,
        log_callback: Option<LogCallback>,
        progress: Option<ProgressCallback>,
        cancel: Option<&CancelHandle>,
    ) -> PipelineResult<RunReport> {
        let run_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        if !root.is_dir() {
            return Err(PipelineError::setup_failed(
                &run_name,
                format!("session root {} is not a directory", root.display()),
            ));
        }

        let _lock = RunLock::acquire(root)
            .map_err(|e| PipelineError::setup_failed(&run_name, e.to_string()))?;

        let logger = RunLogger::create(root, self.settings.logging.to_log_config(), log_callback)
            .map_err(|e| {
                PipelineError::setup_failed(&run_name, format!("cannot create run log: {}", e))
            })?;
        let logger = Arc::new(logger);

        let mut ctx = Context::new(
            root.to_path_buf(),
            self.settings.clone(),
            run_name.clone(),
            Arc::clone(&logger),
        );
        if let Some(progress) = progress {
            ctx = ctx.with_progress_callback(progress);
        }

        let variant = self.settings.pipeline.variant;
        logger.section(&format!("Run '{}' ({:?})", run_name, variant));

        let mut pipeline = create_pipeline(variant);
        if let Some(cancel) = cancel {
            pipeline = pipeline.with_cancel_handle(cancel);
        }

        let mut state = RunState::new(&run_name);
        let run_result = pipeline.run(&ctx, &mut state);
        logger.close();

        match run_result {
            Ok(result) => Ok(RunReport {
                run_name,
                success: true,
                steps_completed: result.steps_completed,
                steps_skipped: result.steps_skipped,
                steps_failed: result.steps_failed,
                validation_passed: state.validation.as_ref().map(|v| v.passed),
                deface_failures: state.deface.as_ref().map(|d| d.failed).unwrap_or(0),
                state,
            }),
            Err(e) => Err(e),
        }
    }
}
