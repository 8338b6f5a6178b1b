//! Step that runs the BIDS converter.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, ConvertOutput, RunState, StepOutcome};
use crate::process::run_tool;

/// Runs the converter against the session root to produce the BIDS
/// tree. Any converter failure (nonzero exit, timeout, failure to
/// start) is fatal; the audit steps still run afterwards.
pub struct ConvertStep;

impl PipelineStep for ConvertStep {
    fn name(&self) -> &str {
        "Convert"
    }

    fn validate_input(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.target().is_none() {
            return Err(StepError::invalid_input(
                "output directory was not reset before conversion",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let converter = &ctx.settings.tools.converter;
        let command = converter.command_line(std::slice::from_ref(&ctx.root));
        ctx.logger.command(&command);

        let out = run_tool(converter, std::slice::from_ref(&ctx.root)).map_err(|e| {
            StepError::command_failed(
                converter.program.clone(),
                -1,
                format!("failed to start: {}", e),
            )
        })?;

        for line in out.stdout_text().lines() {
            ctx.logger.output_line(line, false);
        }
        for line in out.stderr_text().lines() {
            ctx.logger.output_line(line, true);
        }

        state.convert = Some(ConvertOutput {
            exit_code: out.exit_code,
            command,
        });

        if out.timed_out {
            return Err(StepError::timeout(
                converter.program.clone(),
                converter.timeout_ms.unwrap_or(0),
            ));
        }
        if !out.success() {
            ctx.logger.show_tail("Converter output tail");
            return Err(StepError::command_failed(
                converter.program.clone(),
                out.exit_code,
                "conversion failed",
            ));
        }

        ctx.logger.clear_tail();
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        match state.target() {
            Some(target) if target.is_dir() => Ok(()),
            Some(target) => Err(StepError::invalid_output(format!(
                "converter exited cleanly but {} does not exist",
                target.display()
            ))),
            None => Err(StepError::invalid_output("target directory not recorded")),
        }
    }

    fn description(&self) -> &str {
        "Convert the session into a BIDS tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::process::ToolSpec;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sh(script: &str) -> ToolSpec {
        ToolSpec::new("/bin/sh").with_args(["-c", script, "sh"])
    }

    fn ctx(root: &Path, settings: Settings) -> Context {
        let logger = RunLogger::create(root, LogConfig::default(), None).unwrap();
        Context::new(root.to_path_buf(), settings, "t", Arc::new(logger))
    }

    #[test]
    fn successful_conversion_records_output() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.converter = sh(r#"mkdir -p "$1"/bids/StudyA && echo converted"#);
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");
        state.target_dir = Some(dir.path().join("bids/StudyA"));

        let step = ConvertStep;
        step.validate_input(&ctx, &state).unwrap();
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let convert = state.convert.unwrap();
        assert_eq!(convert.exit_code, 0);
        assert!(convert.command.starts_with("/bin/sh"));
    }

    #[test]
    fn nonzero_exit_is_fatal_and_recorded() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.converter = sh("echo broken >&2; exit 3");
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");
        state.target_dir = Some(dir.path().join("bids"));

        let err = ConvertStep.execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::CommandFailed { exit_code: 3, .. }));
        assert_eq!(err.exit_code(), 5);
        // Exit code is recorded even though the step failed
        assert_eq!(state.convert.unwrap().exit_code, 3);
    }

    #[test]
    fn timeout_is_fatal() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.converter = sh("sleep 30").with_timeout_ms(100);
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");
        state.target_dir = Some(dir.path().join("bids"));

        let err = ConvertStep.execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::Timeout { .. }));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn missing_target_after_clean_exit_fails_output_validation() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.converter = sh("exit 0");
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");
        state.target_dir = Some(dir.path().join("bids/Missing"));

        ConvertStep.execute(&ctx, &mut state).unwrap();
        let err = ConvertStep.validate_output(&ctx, &state).unwrap_err();
        assert!(matches!(err, StepError::InvalidOutput(_)));
    }
}
