//! Harness configuration via `lmdb-stress.toml`
//!
//! Every field has a default matching the stock run (100 batches of 100
//! records against `/tmp/lmdb-test/`). A config file only needs the fields
//! it changes; command-line flags override the file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "lmdb-stress.toml";

/// Default environment directory.
pub const DEFAULT_PATH: &str = "/tmp/lmdb-test/";

/// Default storage capacity bound: 2 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 31;

/// Granularity the capacity bound must be a multiple of.
pub const MAP_SIZE_ALIGNMENT: usize = 4096;

/// Check environment limits before anything is opened.
///
/// # Errors
///
/// Returns `InvalidConfig` for a capacity that is zero or not a multiple of
/// [`MAP_SIZE_ALIGNMENT`], a zero database count, or permission bits outside
/// `0o7777`.
pub fn validate_limits(map_size: usize, max_dbs: u32, mode: u32) -> Result<()> {
    if map_size == 0 || map_size % MAP_SIZE_ALIGNMENT != 0 {
        return Err(Error::InvalidConfig(format!(
            "map size {} must be a non-zero multiple of {}",
            map_size, MAP_SIZE_ALIGNMENT
        )));
    }
    if max_dbs == 0 {
        return Err(Error::InvalidConfig(
            "max database count must be at least 1".into(),
        ));
    }
    if mode > 0o7777 {
        return Err(Error::InvalidConfig(format!(
            "mode {:o} is not a permission mask",
            mode
        )));
    }
    Ok(())
}

/// Harness configuration loaded from `lmdb-stress.toml`.
///
/// # Example
///
/// ```toml
/// loop_count = 100
/// batch_count = 100
/// enable_rewind = false
/// path = "/tmp/lmdb-test/"
/// map_size = 2147483648
/// max_dbs = 1
/// mode = 0o644
/// # seed = 42
/// strict_keys = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of write-batch iterations.
    #[serde(default = "default_loop_count")]
    pub loop_count: usize,
    /// Records per batch.
    #[serde(default = "default_batch_count")]
    pub batch_count: usize,
    /// Journal every write to the rewind log.
    #[serde(default)]
    pub enable_rewind: bool,
    /// Environment directory.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Storage capacity bound in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    /// Maximum number of named databases.
    #[serde(default = "default_max_dbs")]
    pub max_dbs: u32,
    /// Permission bits for the data files.
    #[serde(default = "default_mode")]
    pub mode: u32,
    /// Seed for reproducible key generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Fail the run on a duplicate key instead of overwriting it.
    #[serde(default)]
    pub strict_keys: bool,
}

fn default_loop_count() -> usize {
    100
}

fn default_batch_count() -> usize {
    100
}

fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_PATH)
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_max_dbs() -> u32 {
    1
}

fn default_mode() -> u32 {
    0o644
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            loop_count: default_loop_count(),
            batch_count: default_batch_count(),
            enable_rewind: false,
            path: default_path(),
            map_size: default_map_size(),
            max_dbs: default_max_dbs(),
            mode: default_mode(),
            seed: None,
            strict_keys: false,
        }
    }
}

impl HarnessConfig {
    /// Check values that cannot be rejected by the type system.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when [`validate_limits`] rejects the
    /// environment limits.
    pub fn validate(&self) -> Result<()> {
        validate_limits(self.map_size, self.max_dbs, self.mode)
    }

    /// Total number of records a full run writes.
    pub fn total_records(&self) -> usize {
        self.loop_count.saturating_mul(self.batch_count)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# lmdb-stress configuration
#
# Number of write transactions and records per transaction.
loop_count = 100
batch_count = 100

# Journal every write to a rewind log under <path>/rewind/ and replay
# entries past the durable marker on the next open.
enable_rewind = false

# Environment directory, capacity bound in bytes, and named database limit.
path = "/tmp/lmdb-test/"
map_size = 2147483648
max_dbs = 1

# Permission bits applied to the data files.
mode = 0o644

# Seed for reproducible keys (random when unset).
# seed = 42

# Fail on a duplicate key instead of silently overwriting it.
strict_keys = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HarnessConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
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
