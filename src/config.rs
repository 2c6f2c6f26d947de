//! Configuration management for CanaryFS
//!
//! Layered as: built-in defaults, an optional `canaryfs.toml` (or the file
//! given with `--config`), `CANARYFS_*` environment variables, and finally
//! command-line flags applied by the binary.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::access::RuleScope;
use crate::storage::DEFAULT_CAPACITY;

/// Looked up in the working directory when no file is given.
const DEFAULT_FILE: &str = "canaryfs";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CanaryConfig {
    /// Ceiling on the sum of all file sizes.
    /// Environment: CANARYFS_CAPACITY_BYTES
    pub capacity_bytes: u64,

    /// Prompt before every operation.
    /// Environment: CANARYFS_ASK
    pub ask: bool,

    /// Key allowances by operation and path, or by path alone.
    /// Environment: CANARYFS_ASK_SCOPE
    pub ask_scope: RuleScope,

    /// Filesystem name shown in the mount table.
    pub fs_name: String,

    /// Let the kernel unmount when the process exits.
    pub auto_unmount: bool,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY,
            ask: true,
            ask_scope: RuleScope::PerOperation,
            fs_name: "canaryfs".to_string(),
            auto_unmount: false,
        }
    }
}

impl CanaryConfig {
    /// Load defaults, the config file and environment overrides. An explicit
    /// `file` must exist; the default one is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("capacity_bytes", defaults.capacity_bytes as i64)?
            .set_default("ask", defaults.ask)?
            .set_default("ask_scope", "op")?
            .set_default("fs_name", defaults.fs_name)?
            .set_default("auto_unmount", defaults.auto_unmount)?
            .add_source(file_source)
            .add_source(Environment::with_prefix("CANARYFS").try_parsing(true))
            .build()?;

        let config: CanaryConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_bytes == 0 {
            return Err(ConfigError::Message(
                "capacity_bytes must be greater than 0".into(),
            ));
        }

        if self.fs_name.trim().is_empty() {
            return Err(ConfigError::Message("fs_name cannot be empty".into()));
        }

        Ok(())
    }
}
