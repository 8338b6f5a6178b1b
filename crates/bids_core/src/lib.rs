//! BIDS Core - Backend logic for the finalize-and-convert pipeline
//!
//! This crate contains all pipeline logic with no CLI dependencies.
//! It drives the external converter, defacer, validator, and tree
//! lister over a session root and produces the audit artifacts.

pub mod config;
pub mod deface;
pub mod lock;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod process;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
