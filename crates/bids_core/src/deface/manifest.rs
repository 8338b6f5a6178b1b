//! Deface manifest parsing.
//!
//! The manifest (`deface_list.txt`) is a newline-delimited list of
//! imaging files requiring face removal, produced by an external
//! generator and read-only to the pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the manifest file inside the session root.
pub const MANIFEST_FILE: &str = "deface_list.txt";

/// Ordered list of files to deface.
#[derive(Debug, Clone, Default)]
pub struct DefaceManifest {
    records: Vec<String>,
}

impl DefaceManifest {
    /// Parse manifest text. Blank lines and `#` comments are skipped;
    /// record order is preserved.
    pub fn parse(text: &str) -> Self {
        let records = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { records }
    }

    /// Load the manifest from a session root.
    pub fn load(root: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(root.join(MANIFEST_FILE))?;
        Ok(Self::parse(&text))
    }

    /// The records in manifest order.
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve a record to a filesystem path, relative to the root
    /// unless already absolute.
    pub fn resolve(root: &Path, record: &str) -> PathBuf {
        let path = Path::new(record);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}
