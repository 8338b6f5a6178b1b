//! Append-only sentinel log for defacer output.
//!
//! `deface.out` is created if absent and never truncated. Concurrent
//! workers append through one shared handle; the lock is held for a
//! whole block so entries from different workers never interleave
//! mid-line. Consumers must treat block order as arbitrary.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Name of the sentinel file inside the session root.
pub const SENTINEL_FILE: &str = "deface.out";

/// Shared appender for the sentinel log.
pub struct SentinelLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl SentinelLog {
    /// Open (or create) the sentinel in a session root.
    pub fn open(root: &Path) -> io::Result<Self> {
        let path = root.join(SENTINEL_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    /// Path of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one invocation's result block.
    ///
    /// Writes a header line naming the record and exit code, then the
    /// captured output with a guaranteed trailing newline. Every
    /// invocation therefore contributes at least one line.
    pub fn append_result(&self, record: &str, exit_code: i32, output: &[u8]) -> io::Result<()> {
        let mut file = self.file.lock();
        writeln!(file, "### {} (exit {})", record, exit_code)?;
        if !output.is_empty() {
            file.write_all(output)?;
            if output.last() != Some(&b'\n') {
                writeln!(file)?;
            }
        }
        file.flush()
    }
}
