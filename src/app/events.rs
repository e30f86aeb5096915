//! Outbound application events.
//!
//! The controller and the scheduler loop emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to the console, record them in
//! a test, or forward them to a host framework.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, SensorFault};

/// How a watering session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Ran for the configured duration.
    Completed,
    /// Stopped early because the controller is shutting down.
    Cancelled,
    /// Aborted by a fault.
    Failed(Error),
}

impl SessionOutcome {
    pub fn from_result(result: &Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(Error::Cancelled) => Self::Cancelled,
            Err(e) => Self::Failed(e.clone()),
        }
    }
}

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller started; the scheduler loop is running.
    Started { next_due: Option<DateTime<Utc>> },

    /// A session began for the given due time.
    SessionStarted { due: DateTime<Utc> },

    /// A sense read failed mid-session; the held pump decision was kept.
    SensorFault { fault: SensorFault, pump_on: bool },

    /// A session ended.
    SessionFinished {
        outcome: SessionOutcome,
        ran_for: Duration,
    },

    /// The next due time was persisted.
    ScheduleAdvanced {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// The scheduler loop exited after cancellation.
    Stopped,
}
