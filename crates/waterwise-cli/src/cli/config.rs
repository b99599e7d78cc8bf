use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use waterwise_core::CoreConfig;

const CONFIG_FILE_NAME: &str = "config.json";

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Directory holding `storage.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Quiet period before a scan pass runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// `<config dir>/waterwise/config.json`, used when no `--config` is given.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("waterwise").join(CONFIG_FILE_NAME))
    }

    /// Engine config with `data_dir_override` taking precedence over the file.
    pub fn core_config(&self, data_dir_override: Option<&Path>) -> CoreConfig {
        let data_dir = data_dir_override
            .map(Path::to_path_buf)
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(CoreConfig::default_data_dir);

        let config = CoreConfig::new(data_dir);
        match self.debounce_ms {
            Some(ms) => config.with_debounce(Duration::from_millis(ms)),
            None => config,
        }
    }
}
