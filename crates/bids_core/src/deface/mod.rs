//! Defacing fan-out: manifest, sentinel log, and worker pool.
//!
//! The manifest-driven pipeline variant reads `deface_list.txt`,
//! dispatches one defacer invocation per record to a bounded pool of
//! workers, and appends every invocation's output to the append-only
//! `deface.out` sentinel. Per-record failures are aggregated, never
//! fatal; the batch always joins fully before conversion starts.

mod manifest;
mod pool;
mod sentinel;

pub use manifest::{DefaceManifest, MANIFEST_FILE};
pub use pool::{run_deface_batch, WorkerReport};
pub use sentinel::{SentinelLog, SENTINEL_FILE};
