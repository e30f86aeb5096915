//! JSON config file adapter.
//!
//! ```json
//! {
//!   "pump_pin": "17",
//!   "sense_pin": 27,
//!   "water_interval_seconds": 86400,
//!   "water_duration_seconds": 30
//! }
//! ```
//!
//! Pins may be given as strings or numbers.  `board` defaults to `"local"`
//! and the `timing` block to the production cadences.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::WateringConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse and validate a config document.
    pub fn parse(text: &str) -> Result<WateringConfig, ConfigError> {
        let config: WateringConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<WateringConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| ConfigError::Io(e.kind()))?;
        let config = Self::parse(&text)?;
        info!(
            "JsonConfigFile: loaded {} (pump {}, sense {}, board {})",
            self.path.display(),
            config.pump_pin,
            config.sense_pin,
            config.board
        );
        Ok(config)
    }
}
