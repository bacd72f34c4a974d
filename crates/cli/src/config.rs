//! CLI configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crewline_notify::NotifyConfig;
use crewline_work::EngineConfig;
use serde::{Deserialize, Serialize};

/// Contents of `crewline.json`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where records are stored
    pub data_dir: PathBuf,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    pub engine: EngineConfig,
    pub notify: NotifyConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".crewline"),
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
