//! Port traits: the hexagonal boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / WaterScheduler (domain)
//! ```
//!
//! Driven adapters (board pins, schedule storage, clocks, display, event
//! sinks, config files) implement these traits.  The domain consumes them
//! via generics or trait objects, so the core never touches a filesystem,
//! a GPIO register or the system clock directly.
//!
//! ## Safety notes
//!
//! - **ScheduleStore** writes MUST be atomic: a reader never observes a
//!   partially written timestamp.
//! - **Board** pins are resolved once, at construction.  The pump output is
//!   driven only by the in-flight watering session.
//! - All port errors are typed; callers must handle every variant explicitly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::cancel::CancellationToken;
use crate::config::WateringConfig;
use crate::status::StatusLines;

// ───────────────────────────────────────────────────────────────
// Board port (driven adapter: GPIO capability → domain)
// ───────────────────────────────────────────────────────────────

/// Digital I/O capability.  Hands out named pin bindings.
pub trait Board {
    type Input: InputPin + Send + 'static;
    type Output: OutputPin + Send + 'static;

    /// Resolve a named digital input (the sense pin).
    fn input_pin(&mut self, id: &str) -> Result<Self::Input, PinError>;

    /// Resolve a named digital output (the pump pin).
    fn output_pin(&mut self, id: &str) -> Result<Self::Output, PinError>;
}

// ───────────────────────────────────────────────────────────────
// Schedule store port (driven adapter: domain ↔ durable storage)
// ───────────────────────────────────────────────────────────────

/// Persists the single "next water time" value across restarts.
///
/// Single writer: only the scheduler loop writes, and only between
/// sessions.  Status queries may read concurrently.
pub trait ScheduleStore: Send + Sync {
    /// Read the persisted due time.
    fn read_next_time(&self) -> Result<DateTime<Utc>, StoreError>;

    /// Overwrite the persisted due time atomically.
    fn write_next_time(&self, next: DateTime<Utc>) -> Result<(), StoreError>;

    /// Write `default` unless a valid due time is already stored.
    ///
    /// A corrupt value is replaced as well; I/O failures propagate so the
    /// caller can refuse to start without a durable schedule.
    fn ensure_initialized(&self, default: DateTime<Utc>) -> Result<(), StoreError> {
        match self.read_next_time() {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => self.write_next_time(default),
            Err(StoreError::Corrupt) => {
                warn!("ScheduleStore: stored due time is corrupt, reinitialising to {default}");
                self.write_next_time(default)
            }
            Err(e) => Err(e),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: time source → domain)
// ───────────────────────────────────────────────────────────────

/// How a [`Clock::sleep`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full period elapsed.
    Elapsed,
    /// The cancellation token fired first.
    Cancelled,
}

/// Wall clock, monotonic uptime and a cancellable sleep.
///
/// The schedule is anchored to wall-clock time (it must survive restarts);
/// session lengths are measured on the monotonic uptime so a wall-clock
/// step can never stretch a watering pass.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic time since the clock was created.
    fn uptime(&self) -> Duration;

    /// Block for `period`, or until `cancel` fires, whichever is first.
    fn sleep(&self, period: Duration, cancel: &CancellationToken) -> Wake;
}

// ───────────────────────────────────────────────────────────────
// Status display port (driven adapter: domain → two-line display)
// ───────────────────────────────────────────────────────────────

/// External two-line text sink.  Rendering is the adapter's business.
pub trait StatusDisplay: Send {
    fn show(&mut self, lines: &StatusLines) -> Result<(), DisplayError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink: Send {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: config source → domain)
// ───────────────────────────────────────────────────────────────

/// Supplies validated configuration.
///
/// Implementations MUST call [`WateringConfig::validate`] before returning;
/// the core never sees an unvalidated config.
pub trait ConfigPort {
    fn load(&self) -> Result<WateringConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ScheduleStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// No due time has ever been stored.
    NotFound,
    /// Stored bytes do not parse as a timestamp.
    Corrupt,
    /// The storage backend failed.
    Io(std::io::ErrorKind),
}

/// Errors from [`ConfigPort`] operations and config validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config source could not be read.
    Io(std::io::ErrorKind),
    /// The config source is not valid JSON for [`WateringConfig`].
    Malformed(String),
    /// A field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from [`Board`] pin resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    /// The board has no pin with this id.
    Unknown(String),
    /// The pin exists but is already bound elsewhere.
    InUse(String),
}

/// Errors from [`StatusDisplay`] rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// No display is attached or it stopped responding.
    NotConnected,
    /// The display rejected the frame.
    WriteFailed(&'static str),
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no due time stored"),
            Self::Corrupt => write!(f, "stored timestamp is corrupt"),
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "cannot read config ({kind})"),
            Self::Malformed(msg) => write!(f, "malformed config: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl core::fmt::Display for PinError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "no pin named '{id}'"),
            Self::InUse(id) => write!(f, "pin '{id}' is already bound"),
        }
    }
}

impl core::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "display not connected"),
            Self::WriteFailed(msg) => write!(f, "display write failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for PinError {}
impl std::error::Error for DisplayError {}
