//! Configuration loading and typed config structures for a Cairn run.
//!
//! The configuration lives in `cairn-config.yaml` next to the binary's
//! working directory. Every field has a default, so an empty or missing
//! file yields a runnable configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level run configuration, mirroring `cairn-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KernelConfig {
    /// Which world to run and where its state comes from and goes to.
    #[serde(default)]
    pub world: WorldConfig,

    /// Tick loop bounds and pacing.
    #[serde(default)]
    pub simulation: SimulationBounds,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides:
    /// - `CAIRN_STATE_FILE` overrides `world.state_file`
    /// - `CAIRN_DUMP_FILE` overrides `world.dump_file`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str::<Option<Self>>(yaml)?.unwrap_or_default();
        config.world.apply_env_overrides();
        Ok(config)
    }
}

/// World selection and state file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name, used in logs.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// JSON structured state to start from. The starting world is built
    /// when unset.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Where to write the final structured state as JSON, if anywhere.
    #[serde(default)]
    pub dump_file: Option<String>,
}

impl WorldConfig {
    /// Override the state file locations with environment variables when
    /// set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAIRN_STATE_FILE") {
            self.state_file = Some(val);
        }
        if let Ok(val) = std::env::var("CAIRN_DUMP_FILE") {
            self.dump_file = Some(val);
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            state_file: None,
            dump_file: None,
        }
    }
}

/// Tick loop bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SimulationBounds {
    /// Stop after this many ticks. 0 means run until interrupted.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Real-time milliseconds to wait between ticks.
    #[serde(default)]
    pub tick_interval_ms: u64,
}

impl Default for SimulationBounds {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            tick_interval_ms: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_world_name() -> String {
    String::from("Cairn")
}

const fn default_max_ticks() -> u64 {
    10
}

fn default_log_level() -> String {
    String::from("info")
}
