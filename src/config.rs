use blockwatch_scanner::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/blockwatch.toml";

/// Settings of the demo session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    pub seed: u64,
    /// Chunks generated in every direction around the origin.
    pub radius: i32,
    /// Random block edits applied after the initial load.
    pub edits: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            radius: 3,
            edits: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub demo: DemoConfig,
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(cfg) => Self {
                    scanner: cfg.scanner.validated(),
                    ..cfg
                },
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    AppConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                AppConfig::default()
            }
        }
    }
}
