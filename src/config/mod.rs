/*!
 * Configuration
 * Monitor settings from defaults, an optional TOML file, and the command line
 *
 * Precedence: command line > file > defaults.
 */

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::Dimensions;
use crate::core::limits::{DEFAULT_INTERVAL_SECS, DEFAULT_LOG_DIR, DEFAULT_MAX_LOG_SIZE, MIN_INTERVAL_SECS};
use crate::core::{MemoryUnit, Pid};

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    #[diagnostic(code(config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    #[diagnostic(
        code(config::parse),
        help("Expected [monitor] and [analysis] tables; see the README for the keys.")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Sampling interval must be at least 1s, got {0}s")]
    #[diagnostic(code(config::interval))]
    Interval(u64),

    #[error("Maximum log size must be greater than zero")]
    #[diagnostic(code(config::max_log_size))]
    MaxLogSize,
}

/// `[monitor]` table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub pid: Option<Pid>,
    pub name: Option<String>,
    /// Seconds between samples
    pub interval: Option<u64>,
    pub log_path: Option<PathBuf>,
    /// Rotation threshold in bytes
    pub max_log_size: Option<u64>,
    pub unit: Option<MemoryUnit>,
}

/// `[analysis]` table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    pub show_rss: Option<bool>,
    pub show_private: Option<bool>,
    pub show_vms: Option<bool>,
}

/// On-disk configuration; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub monitor: MonitorSection,
    pub analysis: AnalysisSection,
}

impl ConfigFile {
    /// Load `path`; a missing file yields the empty configuration
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Dimensions from the `[analysis]` table, with command-line opt-outs applied
    pub fn dimensions(&self, switches: DimensionSwitches) -> Dimensions {
        Dimensions {
            rss: !switches.no_rss && self.analysis.show_rss.unwrap_or(true),
            private: !switches.no_private && self.analysis.show_private.unwrap_or(true),
            vms: !switches.no_vms && self.analysis.show_vms.unwrap_or(true),
        }
    }
}

/// `--no-rss` / `--no-private` / `--no-vms`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionSwitches {
    pub no_rss: bool,
    pub no_private: bool,
    pub no_vms: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOverrides {
    pub pid: Option<Pid>,
    pub name: Option<String>,
    pub interval_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub max_log_size: Option<u64>,
    pub unit: Option<MemoryUnit>,
    pub switches: DimensionSwitches,
}

/// Resolved monitor settings
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Target pid; wins over `name`
    pub pid: Option<Pid>,
    /// Case-insensitive name fragment
    pub name: Option<String>,
    pub interval: Duration,
    pub log_dir: PathBuf,
    pub max_log_size: u64,
    pub unit: MemoryUnit,
    pub dimensions: Dimensions,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            pid: None,
            name: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            unit: MemoryUnit::default(),
            dimensions: Dimensions::default(),
        }
    }

    /// Merge file values and command-line overrides onto the defaults
    pub fn resolve(file: &ConfigFile, overrides: MonitorOverrides) -> Result<Self, ConfigError> {
        let defaults = Self::new();
        let monitor = &file.monitor;

        let interval_secs = overrides
            .interval_secs
            .or(monitor.interval)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs < MIN_INTERVAL_SECS {
            return Err(ConfigError::Interval(interval_secs));
        }

        let max_log_size = overrides
            .max_log_size
            .or(monitor.max_log_size)
            .unwrap_or(defaults.max_log_size);
        if max_log_size == 0 {
            return Err(ConfigError::MaxLogSize);
        }

        // A pid on the command line beats a name from the file, and vice versa
        let (pid, name) = if overrides.pid.is_some() || overrides.name.is_some() {
            (overrides.pid, overrides.name)
        } else {
            (monitor.pid, monitor.name.clone())
        };

        Ok(Self {
            pid,
            name,
            interval: Duration::from_secs(interval_secs),
            log_dir: overrides
                .log_dir
                .or_else(|| monitor.log_path.clone())
                .unwrap_or(defaults.log_dir),
            max_log_size,
            unit: overrides.unit.or(monitor.unit).unwrap_or(defaults.unit),
            dimensions: file.dimensions(overrides.switches),
        })
    }
}
