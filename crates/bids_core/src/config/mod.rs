//! Configuration management for the pipeline.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use bids_core::config::{ConfigManager, ConfigSection, PipelineVariant};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/bids-pipeline.toml");
//! config.load_or_create().unwrap();
//!
//! // Modify a setting
//! config.settings_mut().pipeline.variant = PipelineVariant::ManifestDriven;
//!
//! // Save just the pipeline section atomically
//! config.update_section(ConfigSection::Pipeline).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, PipelineSettings, PipelineVariant, Settings, ToolSettings,
};
