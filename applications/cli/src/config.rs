/// Layered CLI configuration
use crate::error::{CliError, Result};
use bridge_client::ClientConfig;
use bridge_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "smart-bridge.toml";

/// Environment prefix (`BRIDGE_PLAYBACK__PREVIEW_CAP_MS=30000`)
pub const ENV_PREFIX: &str = "BRIDGE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub backend: ClientConfig,
    pub playback: PlaybackConfig,
    pub collection: CollectionSettings,
    pub device: DeviceSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub path: PathBuf,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/collection.json"),
        }
    }
}

/// Virtual device simulation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Simulated length of every item
    pub item_length_ms: u64,

    /// Simulated time between progress reports
    pub tick_ms: u64,

    /// Clock acceleration (2.0 plays twice as fast)
    pub speed: f64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            item_length_ms: 60_000,
            tick_ms: 250,
            speed: 1.0,
        }
    }
}

impl DeviceSettings {
    pub fn item_length(&self) -> Duration {
        Duration::from_millis(self.item_length_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl CliConfig {
    /// Load configuration: file, then `BRIDGE_*` environment variables
    ///
    /// An explicit `path` must exist; otherwise `smart-bridge.toml` is used
    /// when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.device.speed.is_finite() && self.device.speed > 0.0) {
            return Err(CliError::Config(format!(
                "device.speed must be positive, got {}",
                self.device.speed
            )));
        }
        if self.device.item_length_ms == 0 {
            return Err(CliError::Config(
                "device.item_length_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
