use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};
use tracing::warn;

/// Default number of pending requests the queue holds before producers wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 800;

/// Tuning for the scanner pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Capacity of the bounded update queue.
    pub channel_capacity: usize,
    /// First backoff step in milliseconds while no world is active.
    pub backoff_base_ms: u64,
    /// Upper bound for a single backoff step in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a TOML file, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_else(|err| {
                warn!("Failed to parse {}: {err}. Using defaults", path.display());
                ScannerConfig::default()
            }),
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                ScannerConfig::default()
            }
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str::<ScannerConfig>(contents)?.validated())
    }

    /// Clamp values into a usable range.
    pub fn validated(mut self) -> Self {
        if self.channel_capacity == 0 {
            warn!("channel_capacity must be at least 1; using 1");
            self.channel_capacity = 1;
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            warn!(
                "backoff_max_ms ({}) is below backoff_base_ms ({}); raising it",
                self.backoff_max_ms, self.backoff_base_ms
            );
            self.backoff_max_ms = self.backoff_base_ms;
        }
        self
    }

    /// First backoff step.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Backoff ceiling.
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
