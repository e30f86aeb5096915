//! Background scheduler loop.
//!
//! Wakes on a fixed cadence, consults the schedule store and, when the due
//! time has passed, runs one watering session to completion before
//! advancing the due time.
//!
//! ```text
//!   wake (5 s) ──▶ status push (every 2nd wake)
//!        │
//!        ▼
//!   read next_water_time ── error ──▶ log, skip wake
//!        │
//!        ▼ now >= due
//!   SessionController::run  (synchronous, never overlapped)
//!        │
//!        ▼
//!   persist due + interval ── error ──▶ fatal
//! ```
//!
//! The advance is anchored to the previous due time, not to "now", so the
//! schedule does not drift by the session length or by wake jitter.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use embedded_hal::digital::{ErrorKind, InputPin, OutputPin};
use log::{debug, error, info, warn};

use crate::app::events::{AppEvent, SessionOutcome};
use crate::app::ports::{Clock, EventSink, ScheduleStore, Wake};
use crate::cancel::CancellationToken;
use crate::config::{Timing, WateringConfig};
use crate::error::{ActuatorFault, Error};
use crate::session::SessionController;
use crate::status::{StatusProbe, StatusReporter, format_delta, format_std_duration};
use crate::ticker::Ticker;

/// Due time following `previous`.
pub fn next_due(previous: DateTime<Utc>, interval: TimeDelta) -> DateTime<Utc> {
    previous
        .checked_add_signed(interval)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A session is due at or after its due time.
pub fn is_due(now: DateTime<Utc>, due: DateTime<Utc>) -> bool {
    now >= due
}

/// Shared collaborators handed to the scheduler.
pub struct SchedulerPorts {
    pub store: Arc<dyn ScheduleStore>,
    pub clock: Arc<dyn Clock>,
    pub probe: StatusProbe,
    pub reporter: StatusReporter,
    pub events: Box<dyn EventSink>,
}

pub struct WaterScheduler<I, O> {
    session: SessionController<I, O>,
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    probe: StatusProbe,
    reporter: StatusReporter,
    events: Box<dyn EventSink>,
    interval: TimeDelta,
    timing: Timing,
}

impl<I: InputPin, O: OutputPin> WaterScheduler<I, O> {
    pub fn new(
        session: SessionController<I, O>,
        ports: SchedulerPorts,
        config: &WateringConfig,
    ) -> Self {
        Self {
            session,
            store: ports.store,
            clock: ports.clock,
            probe: ports.probe,
            reporter: ports.reporter,
            events: ports.events,
            interval: config.interval(),
            timing: config.timing,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Returns `Err` only for conditions that must stop the process: an
    /// advance that could not be persisted, or a pump that could not be
    /// confirmed off after a session.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        let mut ticker = Ticker::new(&*self.clock, self.timing.wake_period());
        let push_every = self.timing.idle_push_every_wakes.max(1);
        let mut wakes: u32 = 0;

        info!(
            "Scheduler: running, every {} water for {}",
            format_delta(self.interval),
            format_std_duration(self.probe.duration())
        );

        loop {
            if ticker.tick(&*self.clock, cancel) == Wake::Cancelled {
                break;
            }

            wakes = wakes.wrapping_add(1);
            if wakes % push_every == 0 {
                let _ = self.reporter.report(&self.probe.current());
            }

            self.wake(cancel)?;
        }

        info!("Scheduler: shutdown");
        self.events.emit(&AppEvent::Stopped);
        Ok(())
    }

    /// One scheduler wake: check due-ness, water if due, advance.
    pub fn wake(&mut self, cancel: &CancellationToken) -> Result<(), Error> {
        let due = match self.store.read_next_time() {
            Ok(due) => due,
            Err(e) => {
                warn!("Scheduler: error reading next water time: {e}");
                return Ok(());
            }
        };

        let now = self.clock.now();
        if !is_due(now, due) {
            debug!("Scheduler: next water in {}", format_delta(due - now));
            return Ok(());
        }

        self.events.emit(&AppEvent::SessionStarted { due });
        let started = self.clock.uptime();
        let result = self
            .session
            .run(cancel, &mut self.reporter, &mut *self.events);
        let ran_for = self.clock.uptime().saturating_sub(started);

        if let Err(e) = &result {
            if !e.is_cancelled() {
                error!("Scheduler: error watering: {e}");
            }
        }
        self.events.emit(&AppEvent::SessionFinished {
            outcome: SessionOutcome::from_result(&result),
            ran_for,
        });

        let next = next_due(due, self.interval);
        if let Err(e) = self.store.write_next_time(next) {
            error!("Scheduler: could not persist next water time: {e}");
            return Err(e.into());
        }
        info!("Scheduler: next water time {}", next.to_rfc3339());
        self.events
            .emit(&AppEvent::ScheduleAdvanced { from: due, to: next });

        if !self.session.pump().is_confirmed_off() {
            error!("Scheduler: pump not confirmed off after session");
            return Err(match result {
                Err(e @ Error::Actuator(_)) => e,
                _ => Error::Actuator(ActuatorFault::new(false, ErrorKind::Other)),
            });
        }
        Ok(())
    }
}
