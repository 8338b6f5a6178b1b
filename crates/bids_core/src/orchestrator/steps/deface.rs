//! Step that runs the defacing fan-out.

use crate::deface::{run_deface_batch, DefaceManifest, SentinelLog, MANIFEST_FILE};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, DefaceOutput, RunState, StepOutcome};
use crate::process::run_tool;

/// Defaces every file listed in the manifest with a bounded worker
/// pool. When the manifest is absent the configured generator is run
/// once to produce it; a generator failure or an empty manifest is
/// fatal. Individual defacer failures are aggregated, not fatal.
pub struct DefaceStep;

impl DefaceStep {
    /// Run the list generator to produce the manifest.
    fn generate_manifest(&self, ctx: &Context) -> StepResult<()> {
        let generator = &ctx.settings.tools.list_generator;
        let manifest_path = ctx.root.join(MANIFEST_FILE);

        ctx.logger
            .command(&generator.command_line(std::slice::from_ref(&ctx.root)));

        let out = run_tool(generator, std::slice::from_ref(&ctx.root)).map_err(|e| {
            StepError::manifest(
                manifest_path.clone(),
                format!("generator {} failed to start: {}", generator.program, e),
            )
        })?;

        if out.timed_out {
            return Err(StepError::manifest(
                manifest_path,
                format!("generator {} hit its timeout", generator.program),
            ));
        }
        if !out.success() {
            return Err(StepError::manifest(
                manifest_path,
                format!(
                    "generator {} exited with code {}: {}",
                    generator.program,
                    out.exit_code,
                    out.stderr_text().trim()
                ),
            ));
        }
        Ok(())
    }
}

impl PipelineStep for DefaceStep {
    fn name(&self) -> &str {
        "Deface"
    }

    fn validate_input(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        // The sentinel exists from here on, even if every record fails.
        let sentinel = SentinelLog::open(&ctx.root)
            .map_err(|e| StepError::io_error("opening deface sentinel", e))?;

        let manifest_path = ctx.root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            ctx.logger.info("Manifest absent, running generator");
            self.generate_manifest(ctx)?;
            if !manifest_path.exists() {
                return Err(StepError::manifest(
                    manifest_path,
                    "generator exited cleanly but produced no manifest",
                ));
            }
        }

        let manifest = DefaceManifest::load(&ctx.root)
            .map_err(|e| StepError::manifest(manifest_path.clone(), e.to_string()))?;
        if manifest.is_empty() {
            return Err(StepError::manifest(manifest_path, "manifest has no records"));
        }

        ctx.logger.info(&format!(
            "Defacing {} file(s) with up to {} worker(s)",
            manifest.len(),
            ctx.settings.pipeline.deface_workers
        ));

        let reports = run_deface_batch(
            &ctx.root,
            manifest.records(),
            &ctx.settings.tools.defacer,
            ctx.settings.pipeline.deface_workers,
            &sentinel,
            &ctx.logger,
        );

        let failed = reports.iter().filter(|r| r.failed()).count();
        if failed > 0 {
            ctx.logger.warn(&format!(
                "{} of {} defacer invocation(s) failed; continuing",
                failed,
                reports.len()
            ));
        }

        state.deface = Some(DefaceOutput {
            manifest_path,
            sentinel_path: sentinel.path().to_path_buf(),
            attempted: reports.len(),
            failed,
            reports,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let Some(deface) = &state.deface else {
            return Err(StepError::invalid_output("deface results not recorded"));
        };
        if !deface.sentinel_path.exists() {
            return Err(StepError::invalid_output(format!(
                "sentinel missing at {}",
                deface.sentinel_path.display()
            )));
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Deface manifest records with a bounded worker pool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, RunLogger};
    use crate::process::ToolSpec;
    use std::fs;
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
    fn defaces_every_manifest_record() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "a.nii\nb.nii\nc.nii\n").unwrap();

        let mut settings = Settings::default();
        settings.tools.defacer = sh(r#"echo defaced "$1""#);
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");

        let step = DefaceStep;
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let deface = state.deface.unwrap();
        assert_eq!(deface.attempted, 3);
        assert_eq!(deface.failed, 0);

        let sentinel = fs::read_to_string(&deface.sentinel_path).unwrap();
        assert!(sentinel.contains("### a.nii (exit 0)"));
    }

    #[test]
    fn worker_failures_are_aggregated_not_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "ok.nii\nbad.nii\n").unwrap();

        let mut settings = Settings::default();
        settings.tools.defacer = sh(r#"case "$1" in *bad*) exit 1;; *) exit 0;; esac"#);
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");

        DefaceStep.execute(&ctx, &mut state).unwrap();
        assert_eq!(state.deface.unwrap().failed, 1);
    }

    #[test]
    fn generates_manifest_when_absent() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.list_generator =
            sh(r#"printf 'gen_a.nii\ngen_b.nii\n' > "$1"/deface_list.txt"#);
        settings.tools.defacer = sh("exit 0");
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");

        DefaceStep.execute(&ctx, &mut state).unwrap();
        assert_eq!(state.deface.unwrap().attempted, 2);
        assert!(dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn generator_failure_is_a_manifest_error() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.list_generator = sh("echo scan failed >&2; exit 2");
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");

        let err = DefaceStep.execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::Manifest { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn empty_manifest_is_a_manifest_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "# only comments\n\n").unwrap();

        let ctx = ctx(dir.path(), Settings::default());
        let mut state = RunState::new("t");

        let err = DefaceStep.execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::Manifest { .. }));
    }

    #[test]
    fn sentinel_exists_even_when_manifest_generation_fails() {
        let dir = tempdir().unwrap();

        let mut settings = Settings::default();
        settings.tools.list_generator = sh("exit 1");
        let ctx = ctx(dir.path(), settings);
        let mut state = RunState::new("t");

        let _ = DefaceStep.execute(&ctx, &mut state);
        assert!(dir.path().join("deface.out").exists());
    }
}
