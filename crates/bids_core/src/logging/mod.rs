//! Run logging for the pipeline.
//!
//! This module provides:
//! - A per-run logger writing to `pipeline.log` in the session root
//! - An optional callback sink for embedding (CLI stdout, UI)
//! - Command echo (`$ ...`) before every external invocation
//! - Compact mode with progress filtering and an error tail buffer
//!
//! Library-internal diagnostics go through `tracing`; the run logger is
//! the operator-facing trace the pipeline is required to produce.

mod run_logger;
mod types;

pub use run_logger::{RunLogger, RUN_LOG_FILE};
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};
