//! Daemon configuration file handling.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lumecast_core::LogConfig;
use lumecast_output::{EngineConfig, NodeConfig};
use serde::{Deserialize, Serialize};

/// Maximum accepted config file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Top-level daemon configuration.
///
/// Every section has defaults, so an empty file (or none at all) yields a
/// usable engine. Example:
///
/// ```toml
/// universes = [0, 1]
///
/// [log]
/// level = "info"
/// file_output = true
///
/// [engine]
/// refresh_rate = 40
/// create_policy = "implicit"
///
/// [[nodes]]
/// address = "192.168.1.50"
/// port = 6454
/// universes = [0, 1]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Universes created at startup, before any node subscriptions.
    pub universes: Vec<u16>,
    /// Logging section.
    pub log: LogConfig,
    /// Output engine section.
    pub engine: EngineConfig,
    /// Art-Net nodes to subscribe at startup.
    pub nodes: Vec<NodeConfig>,
}

impl DaemonConfig {
    /// Loads a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_limit(path, MAX_CONFIG_FILE_SIZE)
    }

    fn load_with_limit(path: &Path, limit: u64) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read config metadata: {}", path.display()))?;
        if metadata.len() > limit {
            bail!(
                "Config file {} is {} bytes, exceeds the {} byte limit",
                path.display(),
                metadata.len(),
                limit
            );
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}
