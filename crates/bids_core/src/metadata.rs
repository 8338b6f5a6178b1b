//! Finalized-session metadata descriptor.
//!
//! The metadata-driven pipeline variant reads `finalized.json` from the
//! session root to learn the dataset name, which becomes the last
//! component of the BIDS output directory. A missing or malformed
//! descriptor is fatal before any destructive step runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the descriptor file inside the session root.
pub const FINALIZED_FILE: &str = "finalized.json";

/// Errors that can occur while reading the descriptor.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Descriptor not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read descriptor: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse descriptor: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid dataset name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Top-level shape of `finalized.json`.
///
/// Only the fields the pipeline consumes are modeled; unknown fields
/// are ignored on parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedDescriptor {
    #[serde(rename = "datasetDescription")]
    pub dataset_description: DatasetDescription,
}

/// The `datasetDescription` object of the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescription {
    #[serde(rename = "Name")]
    pub name: String,
}

impl FinalizedDescriptor {
    /// Load the descriptor from a session root.
    pub fn load(root: &Path) -> MetadataResult<Self> {
        let path = root.join(FINALIZED_FILE);
        if !path.exists() {
            return Err(MetadataError::NotFound(path));
        }

        let content = fs::read_to_string(&path)?;
        let descriptor: FinalizedDescriptor = serde_json::from_str(&content)?;
        Ok(descriptor)
    }
}

/// Read and validate the dataset name from a session root.
///
/// The name becomes a directory component, so names that would escape
/// or collide with the output tree are rejected.
pub fn read_dataset_name(root: &Path) -> MetadataResult<String> {
    let descriptor = FinalizedDescriptor::load(root)?;
    let name = descriptor.dataset_description.name;
    validate_dataset_name(&name)?;
    Ok(name)
}

fn validate_dataset_name(name: &str) -> MetadataResult<()> {
    let reject = |reason: &str| {
        Err(MetadataError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name == "." || name == ".." {
        return reject("name is a relative path component");
    }
    if name.contains('/') || name.contains('\\') {
        return reject("name contains a path separator");
    }
    if name.contains('\0') {
        return reject("name contains a NUL byte");
    }

    Ok(())
}
