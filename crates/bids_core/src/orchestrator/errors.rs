//! Error types for the pipeline orchestrator.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Operation → Detail
//!
//! Fatal error classes map to distinct exit codes so operators can
//! tell from a status alone which stage aborted a run:
//! 0 success (validator findings included), 2 usage, 3 metadata,
//! 4 manifest, 5 external tool, 6 setup/lock, 130 cancelled, 1 other.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Run '{run_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Failed to set up the run (lock, logger, session root).
    #[error("Run '{run_name}' setup failed: {message}")]
    SetupFailed { run_name: String, message: String },

    /// Pipeline was cancelled.
    #[error("Run '{run_name}' was cancelled")]
    Cancelled { run_name: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(run_name: impl Into<String>) -> Self {
        Self::Cancelled {
            run_name: run_name.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed { source, .. } => source.exit_code(),
            Self::SetupFailed { .. } => 6,
            Self::Cancelled { .. } => 130,
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// The session metadata descriptor is missing or unusable.
    #[error("Metadata error in {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// The deface manifest could not be produced or read.
    #[error("Manifest error in {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// An external command failed.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// An external command hit its configured timeout.
    #[error("{tool} killed after {waited_ms}ms timeout")]
    Timeout { tool: String, waited_ms: u64 },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A required file was not found.
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a manifest error.
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(tool: impl Into<String>, waited_ms: u64) -> Self {
        Self::Timeout {
            tool: tool.into(),
            waited_ms,
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Process exit code for this error class when fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Metadata { .. } => 3,
            Self::Manifest { .. } => 4,
            Self::CommandFailed { .. } | Self::Timeout { .. } => 5,
            _ => 1,
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::command_failed("convert.js", 2, "missing sidecar");
        let msg = err.to_string();
        assert!(msg.contains("convert.js"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("missing sidecar"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::file_not_found("/data/session/finalized.json");
        let pipeline_err = PipelineError::step_failed("session_01", "ReadMetadata", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("session_01"));
        assert!(msg.contains("ReadMetadata"));
    }

    #[test]
    fn exit_codes_distinguish_fatal_classes() {
        let metadata = PipelineError::step_failed(
            "r",
            "ReadMetadata",
            StepError::metadata("/x/finalized.json", "bad"),
        );
        assert_eq!(metadata.exit_code(), 3);

        let manifest = PipelineError::step_failed(
            "r",
            "Deface",
            StepError::manifest("/x/deface_list.txt", "bad"),
        );
        assert_eq!(manifest.exit_code(), 4);

        let convert =
            PipelineError::step_failed("r", "Convert", StepError::command_failed("c", 1, "x"));
        assert_eq!(convert.exit_code(), 5);

        assert_eq!(PipelineError::setup_failed("r", "locked").exit_code(), 6);
        assert_eq!(PipelineError::cancelled("r").exit_code(), 130);
    }
}
