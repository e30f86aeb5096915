//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A host-framework adapter would implement the same
//! trait.

use log::{error, info, warn};

use crate::app::events::{AppEvent, SessionOutcome};
use crate::app::ports::EventSink;
use crate::status::format_std_duration;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { next_due } => match next_due {
                Some(due) => info!("START | next water time {}", due.to_rfc3339()),
                None => info!("START | next water time unknown"),
            },
            AppEvent::SessionStarted { due } => {
                info!("SESSION | starting a watering (due {})", due.to_rfc3339());
            }
            AppEvent::SensorFault { fault, pump_on } => {
                warn!(
                    "SESSION | {} | holding pump {}",
                    fault,
                    if *pump_on { "ON" } else { "OFF" }
                );
            }
            AppEvent::SessionFinished { outcome, ran_for } => {
                let ran = format_std_duration(*ran_for);
                match outcome {
                    SessionOutcome::Completed => info!("SESSION | completed after {ran}"),
                    SessionOutcome::Cancelled => info!("SESSION | cancelled after {ran}"),
                    SessionOutcome::Failed(e) => error!("SESSION | failed after {ran}: {e}"),
                }
            }
            AppEvent::ScheduleAdvanced { from, to } => {
                info!(
                    "SCHEDULE | {} -> {}",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                );
            }
            AppEvent::Stopped => info!("STOP | scheduler shut down"),
        }
    }
}
