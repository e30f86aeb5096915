//! Unified error types for the controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! scheduler loop's error handling uniform.  Port-specific errors live next
//! to their traits in [`crate::app::ports`]; this module only adds the pin
//! faults raised while a session is driving hardware.

use core::fmt;

use embedded_hal::digital::ErrorKind;

use crate::app::ports::{ConfigError, PinError, StoreError};

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A named pin could not be resolved on the board.
    Pin(PinError),
    /// The durable schedule store failed.
    Store(StoreError),
    /// The sense input could not be read.
    Sensor(SensorFault),
    /// The pump output could not be driven.
    Actuator(ActuatorFault),
    /// The scheduler thread could not be started.
    Spawn(std::io::ErrorKind),
    /// Cooperative shutdown.  Not a failure.
    Cancelled,
}

impl Error {
    /// True for the shutdown signal, which callers treat as normal exit.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Pin(e) => write!(f, "pin: {e}"),
            Self::Store(e) => write!(f, "schedule store: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Spawn(kind) => write!(f, "could not start scheduler thread ({kind})"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        Self::Pin(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// The sense input returned an error for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault {
    pub kind: ErrorKind,
}

impl SensorFault {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sense read failed ({:?})", self.kind)
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator faults
// ---------------------------------------------------------------------------

/// The pump output rejected a write.
///
/// An unresponsive pump output is a safety condition rather than a
/// retryable I/O hiccup: the session that sees one aborts immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorFault {
    /// Level the controller was trying to drive.
    pub requested: bool,
    pub kind: ErrorKind,
}

impl ActuatorFault {
    pub fn new(requested: bool, kind: ErrorKind) -> Self {
        Self { requested, kind }
    }
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.requested { "high" } else { "low" };
        write!(f, "failed to set pump pin {level} ({:?})", self.kind)
    }
}

impl From<ActuatorFault> for Error {
    fn from(e: ActuatorFault) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
