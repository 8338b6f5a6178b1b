//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level
//! updates.

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};
use crate::process::ToolSpec;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// External tool invocations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Run-log configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Which pipeline strategy drives a run.
///
/// The metadata-driven variant resolves the output directory from the
/// dataset name in `finalized.json`; the manifest-driven variant
/// defaces files listed in `deface_list.txt` and converts into a plain
/// `bids/` directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    #[default]
    MetadataDriven,
    ManifestDriven,
}

/// Pipeline behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Strategy selecting the step sequence.
    #[serde(default)]
    pub variant: PipelineVariant,

    /// Concurrent defacer invocations in the fan-out stage.
    #[serde(default = "default_deface_workers")]
    pub deface_workers: usize,
}

fn default_deface_workers() -> usize {
    10
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::default(),
            deface_workers: default_deface_workers(),
        }
    }
}

/// External tool configuration.
///
/// Each tool receives one path argument appended after its fixed args:
/// the session root (converter, list generator), the target directory
/// (validator, tree lister), or a manifest record (defacer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Converter producing the BIDS tree from the session root.
    #[serde(default = "default_converter")]
    pub converter: ToolSpec,

    /// BIDS validator run against the target directory.
    #[serde(default = "default_validator")]
    pub validator: ToolSpec,

    /// Defacer run once per manifest record.
    #[serde(default = "default_defacer")]
    pub defacer: ToolSpec,

    /// Generator producing `deface_list.txt` when it is absent.
    #[serde(default = "default_list_generator")]
    pub list_generator: ToolSpec,

    /// Directory-structure lister captured into `tree.log`.
    #[serde(default = "default_tree")]
    pub tree: ToolSpec,
}

fn default_converter() -> ToolSpec {
    ToolSpec::new("./convert.js")
}

fn default_validator() -> ToolSpec {
    ToolSpec::new("bids-validator")
}

fn default_defacer() -> ToolSpec {
    ToolSpec::new("./deface.py")
}

fn default_list_generator() -> ToolSpec {
    ToolSpec::new("./deface_list.sh")
}

fn default_tree() -> ToolSpec {
    ToolSpec::new("tree")
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            converter: default_converter(),
            validator: default_validator(),
            defacer: default_defacer(),
            list_generator: default_list_generator(),
            tree: default_tree(),
        }
    }
}

/// Run-log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Show timestamps in the run log.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Number of tool-output lines to show in the error tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> usize {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: default_true(),
            show_timestamps: default_true(),
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
        }
    }
}

impl LoggingSettings {
    /// Build the run-logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: LogLevel::Info,
            compact: self.compact,
            progress_step: self.progress_step,
            error_tail: self.error_tail,
            show_timestamps: self.show_timestamps,
        }
    }
}

/// Identifies a config section for atomic section-level updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Pipeline,
    Tools,
    Logging,
}

impl ConfigSection {
    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Pipeline => "pipeline",
            ConfigSection::Tools => "tools",
            ConfigSection::Logging => "logging",
        }
    }
}
