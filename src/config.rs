//! Controller configuration.
//!
//! Supplied by a [`ConfigPort`](crate::app::ports::ConfigPort) adapter and
//! validated before the controller is constructed.  The core only ever
//! reads it.

use std::time::Duration;

use chrono::TimeDelta;
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::app::ports::ConfigError;

/// Upper bound for interval and duration (ten years), keeps timestamp
/// arithmetic far away from overflow.
pub const MAX_PERIOD_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Watering parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringConfig {
    // --- Pins ---
    /// Pump output pin id.  Numbers are accepted and resolved by their
    /// decimal name.
    #[serde(deserialize_with = "pin_id")]
    pub pump_pin: String,
    /// Sense (moisture / float) input pin id.
    #[serde(deserialize_with = "pin_id")]
    pub sense_pin: String,
    /// Board component that owns both pins.
    #[serde(default = "default_board")]
    pub board: String,

    // --- Schedule ---
    /// Seconds between the starts of consecutive watering sessions.
    pub water_interval_seconds: u64,
    /// Length of one watering session in seconds.
    pub water_duration_seconds: u64,

    // --- Timing ---
    #[serde(default)]
    pub timing: Timing,
}

/// Loop cadences.  The defaults are the production values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Sense sampling period during a session (milliseconds).
    pub sample_period_ms: u64,
    /// Scheduler wake period (milliseconds).
    pub wake_period_ms: u64,
    /// Idle status push every N scheduler wakes.
    pub idle_push_every_wakes: u32,
    /// Session status push every N sample ticks.
    pub session_push_every_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sample_period_ms: 100,      // 10 Hz
            wake_period_ms: 5_000,      // every 5 s
            idle_push_every_wakes: 2,   // ~10 s
            session_push_every_ticks: 20, // ~2 s
        }
    }
}

impl Timing {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn wake_period(&self) -> Duration {
        Duration::from_millis(self.wake_period_ms)
    }
}

impl WateringConfig {
    /// Build a config for the default board with production timing.
    pub fn new(
        pump_pin: impl Into<String>,
        sense_pin: impl Into<String>,
        water_interval_seconds: u64,
        water_duration_seconds: u64,
    ) -> Self {
        Self {
            pump_pin: pump_pin.into(),
            sense_pin: sense_pin.into(),
            board: default_board(),
            water_interval_seconds,
            water_duration_seconds,
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Check every field.  Called by config adapters before handing the
    /// config to the core.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_unset_pin(&self.pump_pin) || is_unset_pin(&self.sense_pin) {
            return Err(ConfigError::ValidationFailed(
                "pump_pin and sense_pin must be non-empty",
            ));
        }
        if self.pump_pin == self.sense_pin {
            return Err(ConfigError::ValidationFailed(
                "pump_pin and sense_pin must be different pins",
            ));
        }
        if self.water_interval_seconds == 0 || self.water_duration_seconds == 0 {
            return Err(ConfigError::ValidationFailed(
                "water_interval_seconds and water_duration_seconds must be non-zero",
            ));
        }
        if self.water_interval_seconds > MAX_PERIOD_SECONDS
            || self.water_duration_seconds > MAX_PERIOD_SECONDS
        {
            return Err(ConfigError::ValidationFailed(
                "water_interval_seconds and water_duration_seconds must be at most ten years",
            ));
        }
        if self.board.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("board must be non-empty"));
        }
        if self.timing.sample_period_ms == 0
            || self.timing.wake_period_ms == 0
            || self.timing.idle_push_every_wakes == 0
            || self.timing.session_push_every_ticks == 0
        {
            return Err(ConfigError::ValidationFailed("timing values must be non-zero"));
        }
        if self.water_duration_seconds >= self.water_interval_seconds {
            warn!(
                "Config: watering for {}s every {}s leaves no idle time between sessions",
                self.water_duration_seconds, self.water_interval_seconds
            );
        }
        Ok(())
    }

    /// Interval as a wall-clock offset for schedule arithmetic.
    pub fn interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.water_interval_seconds.min(MAX_PERIOD_SECONDS) as i64)
    }

    /// Session length on the monotonic clock.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.water_duration_seconds)
    }
}

fn default_board() -> String {
    "local".into()
}

fn is_unset_pin(id: &str) -> bool {
    let id = id.trim();
    id.is_empty() || id == "0"
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPinId {
    Number(u64),
    Name(String),
}

fn pin_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawPinId::deserialize(deserializer)? {
        RawPinId::Number(n) => n.to_string(),
        RawPinId::Name(name) => name,
    })
}
