//! Builder configuration via `derivex.toml`
//!
//! A builder is fully described by its data directory, its namespace and a
//! few tuning knobs for the tokenizer and the external sort. Configs can be
//! built in code or loaded from a TOML file; either way [`BuilderConfig::validate`]
//! runs before a builder accepts them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the data directory by convention.
pub const CONFIG_FILE_NAME: &str = "derivex.toml";

/// External sort tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortConfig {
    /// Records held in memory per sorted run (default: 100 000).
    #[serde(default = "default_chunk_records")]
    pub chunk_records: usize,
    /// Runs merged together per merge pass (default: 64).
    #[serde(default = "default_fan_in")]
    pub fan_in: usize,
    /// Directory for sorted runs. Defaults to the builder's data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

fn default_chunk_records() -> usize {
    100_000
}

fn default_fan_in() -> usize {
    64
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig {
            chunk_records: default_chunk_records(),
            fan_in: default_fan_in(),
            scratch_dir: None,
        }
    }
}

/// What a single document contributes to a token's category counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CounterMode {
    /// One per document containing the token
    #[default]
    Documents,
    /// The token's occurrence count within the document
    Occurrences,
}

/// Token-counter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterConfig {
    /// Counting mode (default: `documents`)
    #[serde(default)]
    pub mode: CounterMode,
}

/// Configuration for one index builder.
///
/// # Example
///
/// ```toml
/// data_dir = "/var/lib/derivex/classifier"
/// name = "who_has"
/// max_tuple = 3
///
/// [sort]
/// chunk_records = 100000
/// fan_in = 64
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Directory holding the builder's spill, sorted and published files.
    pub data_dir: PathBuf,
    /// Builder namespace; every file name derives from it.
    pub name: String,
    /// Longest n-gram emitted by the tokenizer (default: 1).
    #[serde(default = "default_max_tuple")]
    pub max_tuple: usize,
    /// External sort tuning.
    #[serde(default)]
    pub sort: SortConfig,
    /// Token-counter settings, ignored by other schemas.
    #[serde(default)]
    pub counter: CounterConfig,
}

fn default_max_tuple() -> usize {
    1
}

impl BuilderConfig {
    /// Config with defaults for everything but location and name.
    pub fn new(data_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        BuilderConfig {
            data_dir: data_dir.into(),
            name: name.into(),
            max_tuple: default_max_tuple(),
            sort: SortConfig::default(),
            counter: CounterConfig::default(),
        }
    }

    /// Set the n-gram order (builder pattern).
    pub fn with_max_tuple(mut self, max_tuple: usize) -> Self {
        self.max_tuple = max_tuple;
        self
    }

    /// Set the in-memory run size of the external sort (builder pattern).
    pub fn with_chunk_records(mut self, chunk_records: usize) -> Self {
        self.sort.chunk_records = chunk_records;
        self
    }

    /// Set the merge fan-in of the external sort (builder pattern).
    pub fn with_fan_in(mut self, fan_in: usize) -> Self {
        self.sort.fan_in = fan_in;
        self
    }

    /// Set the token-counter mode (builder pattern).
    pub fn with_counter_mode(mut self, mode: CounterMode) -> Self {
        self.counter.mode = mode;
        self
    }

    /// Directory used for sorted runs.
    pub fn scratch_dir(&self) -> &Path {
        self.sort.scratch_dir.as_deref().unwrap_or(&self.data_dir)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidConfig("name must not be empty".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidConfig(format!(
                "name '{}' may only contain ASCII letters, digits, '_' and '-'",
                self.name
            )));
        }
        if self.max_tuple == 0 {
            return Err(Error::InvalidConfig("max_tuple must be at least 1".into()));
        }
        if self.sort.chunk_records == 0 {
            return Err(Error::InvalidConfig(
                "sort.chunk_records must be at least 1".into(),
            ));
        }
        if self.sort.fan_in < 2 {
            return Err(Error::InvalidConfig("sort.fan_in must be at least 2".into()));
        }
        Ok(())
    }

    /// Returns a commented template config.
    pub fn default_toml() -> &'static str {
        r#"# derivex builder configuration
#
# Directory holding <name>.spill, <name>.sorted and the published <name>.idx
data_dir = "."

# Builder namespace (ASCII letters, digits, '_' and '-')
name = "index"

# Longest n-gram emitted per document (1 = single words only)
max_tuple = 1

[sort]
# Records held in memory per sorted run
chunk_records = 100000
# Runs merged per merge pass
fan_in = 64
# scratch_dir = "/tmp/derivex"

[counter]
# "documents" = +1 per document containing a token
# "occurrences" = +occurrence count per document
mode = "documents"
"#
    }

    /// Read, parse and validate config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: BuilderConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the template config if the file does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
