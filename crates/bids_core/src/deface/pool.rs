//! Bounded worker-pool fan-out for defacer invocations.
//!
//! One defacer invocation per manifest record, up to `workers`
//! concurrent invocations. No ordering is guaranteed between workers;
//! the batch joins fully before returning. A failed invocation never
//! aborts the batch - outcomes are aggregated for the caller.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logging::RunLogger;
use crate::process::{run_tool, ToolSpec};

use super::manifest::DefaceManifest;
use super::sentinel::SentinelLog;

/// Outcome of one defacer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Manifest record the invocation processed.
    pub record: String,
    /// Defacer exit code (-1 if it could not be spawned or was killed).
    pub exit_code: i32,
    /// Whether the invocation hit the configured timeout.
    pub timed_out: bool,
    /// Spawn error, if the defacer never started.
    pub spawn_error: Option<String>,
}

impl WorkerReport {
    /// Whether this invocation counts as failed.
    pub fn failed(&self) -> bool {
        self.exit_code != 0 || self.timed_out || self.spawn_error.is_some()
    }
}

/// Run the defacer over every record with a bounded worker pool.
///
/// Each invocation receives the resolved record path as its argument
/// and has its output appended to the sentinel log. Returns one report
/// per record, in manifest order.
pub fn run_deface_batch(
    root: &Path,
    records: &[String],
    defacer: &ToolSpec,
    workers: usize,
    sentinel: &SentinelLog,
    logger: &RunLogger,
) -> Vec<WorkerReport> {
    if records.is_empty() {
        return Vec::new();
    }

    let workers = workers.clamp(1, records.len());
    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<(usize, WorkerReport)>> = Mutex::new(Vec::with_capacity(records.len()));

    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(record) = records.get(index) else {
                    break;
                };

                let target = DefaceManifest::resolve(root, record);
                logger.command(&defacer.command_line(std::slice::from_ref(&target)));

                let report = match run_tool(defacer, std::slice::from_ref(&target)) {
                    Ok(out) => {
                        let _ = sentinel.append_result(record, out.exit_code, &out.combined());
                        if !out.success() {
                            logger.warn(&format!(
                                "defacer exited with code {} for {}",
                                out.exit_code, record
                            ));
                        }
                        WorkerReport {
                            record: record.clone(),
                            exit_code: out.exit_code,
                            timed_out: out.timed_out,
                            spawn_error: None,
                        }
                    }
                    Err(e) => {
                        let message = e.to_string();
                        let _ = sentinel.append_result(record, -1, message.as_bytes());
                        logger.warn(&format!("defacer failed to start for {}: {}", record, message));
                        WorkerReport {
                            record: record.clone(),
                            exit_code: -1,
                            timed_out: false,
                            spawn_error: Some(message),
                        }
                    }
                };

                results.lock().push((index, report));
            });
        }
    });

    let mut reports = results.into_inner();
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}
