use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEBOUNCE_MS;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    /// Quiet period the observation driver waits for before a pass.
    pub debounce: Duration,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            debounce: Duration::from_millis(DEBOUNCE_MS),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Platform data directory, or `./waterwise_data` when there is none.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("waterwise"))
            .unwrap_or_else(|| PathBuf::from("waterwise_data"))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}
