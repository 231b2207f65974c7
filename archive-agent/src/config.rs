//! Configuration management for the archive agent.
//!
//! Built-in defaults, optionally layered with a TOML file and then with
//! `ARCHIVE_AGENT__<SECTION>__<KEY>` environment overrides.

use crate::utils::errors::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ARCHIVE_AGENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub agent: AgentConfig,
    pub log: LogConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identifier logged with every session
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local directory backing the manifest `src` (disk) root
    pub disk_dir: PathBuf,

    /// Local directory backing the manifest `dst` (tape) root
    pub tape_dir: PathBuf,
}

/// Tunables of the root check and the mutability toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Attribute holding the directory ACL
    #[serde(default = "default_acl_attribute")]
    pub acl_attribute: String,

    /// ACL rule that blocks writes
    #[serde(default = "default_immutable_marker")]
    pub immutable_marker: String,

    /// Files allowed in a get destination before the transfer
    #[serde(default = "default_max_root_files")]
    pub max_root_files: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            acl_attribute: default_acl_attribute(),
            immutable_marker: default_immutable_marker(),
            max_root_files: default_max_root_files(),
        }
    }
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_acl_attribute() -> String {
    "sys.acl".to_string()
}

fn default_immutable_marker() -> String {
    "z:i".to_string()
}

fn default_max_root_files() -> u64 {
    2 // the manifest plus an optional progress marker
}

impl Default for Config {
    fn default() -> Self {
        Config {
            agent: AgentConfig {
                id: hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "archive-agent-01".to_string()),
            },
            log: LogConfig {
                level: default_log_level(),
            },
            storage: StorageConfig {
                disk_dir: PathBuf::from("/var/lib/archive-agent/disk"),
                tape_dir: PathBuf::from("/var/lib/archive-agent/tape"),
            },
            archive: ArchiveConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration: defaults, then `path` if given, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default()).map_err(config_error)?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ArchiveError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)
    }
}

fn config_error(e: config::ConfigError) -> ArchiveError {
    ArchiveError::Config(e.to_string())
}
