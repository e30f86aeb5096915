//! Watering session controller.
//!
//! One session is one bounded-duration pass of the sense-gated pump loop:
//!
//! ```text
//!   arm guard ──▶ ┌──── every sample tick ─────────────┐ ──▶ release guard
//!  (is_watering)  │ read sense ─▶ decide ─▶ drive pump │     (pump low,
//!                 └──── until duration or cancel ──────┘      !is_watering)
//! ```
//!
//! ## Safety contract
//!
//! The pump output is low whenever control leaves [`SessionController::run`],
//! whatever the exit path: completion, actuator fault, cancellation, or a
//! panic unwinding through the loop.  [`SessionGuard`] owns that guarantee.
//!
//! ## Sense policy
//!
//! Sense `true` means wet (or float triggered): pump off.  Sense `false`
//! means dry: pump on.  A failed read keeps the last decision; before the
//! first good read the decision is "off".

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use embedded_hal::digital::{Error as _, InputPin, OutputPin, PinState};
use log::{error, info};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, Wake};
use crate::cancel::CancellationToken;
use crate::config::Timing;
use crate::error::{ActuatorFault, Error, SensorFault};
use crate::status::{Status, StatusProbe, StatusReporter, format_std_duration};
use crate::ticker::Ticker;

// ───────────────────────────────────────────────────────────────
// Pump line
// ───────────────────────────────────────────────────────────────

struct PumpInner<O> {
    pin: O,
    /// Last level successfully written.
    on: bool,
    /// The last write was a successful "low".
    confirmed_off: bool,
    /// Set by shutdown; no further "high" writes are honoured.
    locked_out: bool,
}

/// The pump output, shared between the scheduler thread and shutdown.
///
/// Only the in-flight session asks for "high".  Shutdown locks the line
/// out, after which every write is forced low.
pub struct PumpLine<O> {
    inner: Mutex<PumpInner<O>>,
}

impl<O: OutputPin> PumpLine<O> {
    pub fn new(pin: O) -> Self {
        Self {
            inner: Mutex::new(PumpInner {
                pin,
                on: false,
                confirmed_off: false,
                locked_out: false,
            }),
        }
    }

    // A poisoned lock must not stop us switching the pump off.
    fn inner(&self) -> MutexGuard<'_, PumpInner<O>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(inner: &mut PumpInner<O>, on: bool) -> Result<(), ActuatorFault> {
        let level = on && !inner.locked_out;
        let state = if level { PinState::High } else { PinState::Low };
        match inner.pin.set_state(state) {
            Ok(()) => {
                inner.on = level;
                inner.confirmed_off = !level;
                Ok(())
            }
            Err(e) => {
                inner.confirmed_off = false;
                Err(ActuatorFault::new(level, e.kind()))
            }
        }
    }

    /// Drive the pump.  After [`lock_out`](Self::lock_out) this always
    /// writes low.
    pub fn drive(&self, on: bool) -> Result<(), ActuatorFault> {
        Self::write(&mut self.inner(), on)
    }

    pub fn deassert(&self) -> Result<(), ActuatorFault> {
        self.drive(false)
    }

    /// Refuse all future "high" writes and drive the pump low now.
    pub fn lock_out(&self) -> Result<(), ActuatorFault> {
        let mut inner = self.inner();
        inner.locked_out = true;
        Self::write(&mut inner, false)
    }

    pub fn is_on(&self) -> bool {
        self.inner().on
    }

    /// True only if the most recent write was a successful "low".
    pub fn is_confirmed_off(&self) -> bool {
        self.inner().confirmed_off
    }

    pub fn is_locked_out(&self) -> bool {
        self.inner().locked_out
    }
}

// ───────────────────────────────────────────────────────────────
// Scoped guard
// ───────────────────────────────────────────────────────────────

/// Holds "pump active" intent for the lifetime of a session.
///
/// Arming marks the controller as watering.  Dropping (or releasing)
/// drives the pump low and clears the watering flag.
pub struct SessionGuard<'a, O: OutputPin> {
    pump: &'a PumpLine<O>,
    probe: &'a StatusProbe,
    released: bool,
}

impl<'a, O: OutputPin> SessionGuard<'a, O> {
    pub fn arm(pump: &'a PumpLine<O>, probe: &'a StatusProbe) -> Self {
        probe.begin_watering();
        Self {
            pump,
            probe,
            released: false,
        }
    }

    /// Normal exit: deassert and report whether the pump accepted it.
    pub fn release(mut self) -> Result<(), ActuatorFault> {
        self.released = true;
        let result = self.pump.deassert();
        self.probe.end_watering();
        result
    }
}

impl<O: OutputPin> Drop for SessionGuard<'_, O> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pump.deassert() {
            error!("Session: could not switch pump off on exit: {e}");
        }
        self.probe.end_watering();
    }
}

// ───────────────────────────────────────────────────────────────
// Session controller
// ───────────────────────────────────────────────────────────────

/// Runs watering sessions against one sense input and one pump line.
pub struct SessionController<I, O> {
    sense: I,
    pump: Arc<PumpLine<O>>,
    clock: Arc<dyn Clock>,
    probe: StatusProbe,
    duration: Duration,
    timing: Timing,
}

impl<I: InputPin, O: OutputPin> SessionController<I, O> {
    pub fn new(
        sense: I,
        pump: Arc<PumpLine<O>>,
        clock: Arc<dyn Clock>,
        probe: StatusProbe,
        duration: Duration,
        timing: Timing,
    ) -> Self {
        Self {
            sense,
            pump,
            clock,
            probe,
            duration,
            timing,
        }
    }

    pub fn pump(&self) -> &PumpLine<O> {
        &self.pump
    }

    /// Run one session.
    ///
    /// Returns `Err(Error::Cancelled)` if `cancel` fired, and
    /// `Err(Error::Actuator(_))` if the pump rejected a write.  Sense read
    /// failures never end the session.
    pub fn run(
        &mut self,
        cancel: &CancellationToken,
        reporter: &mut StatusReporter,
        events: &mut dyn EventSink,
    ) -> Result<(), Error> {
        let guard = SessionGuard::arm(&self.pump, &self.probe);
        let clock = &*self.clock;
        let started = clock.uptime();
        let mut ticker = Ticker::new(clock, self.timing.sample_period());
        let push_every = self.timing.session_push_every_ticks.max(1);
        let mut pump_on = false;
        let mut ticks: u32 = 0;

        info!(
            "Session: starting to water for {}",
            format_std_duration(self.duration)
        );

        while clock.uptime().saturating_sub(started) < self.duration {
            if ticker.tick(clock, cancel) == Wake::Cancelled {
                info!("Session: shutdown");
                return Err(Error::Cancelled);
            }

            match self.sense.is_high() {
                Ok(wet) => pump_on = !wet,
                Err(e) => {
                    let fault = SensorFault::new(e.kind());
                    events.emit(&AppEvent::SensorFault { fault, pump_on });
                }
            }

            if let Err(fault) = self.pump.drive(pump_on) {
                error!("Session: {fault}, aborting");
                return Err(fault.into());
            }

            ticks = ticks.wrapping_add(1);
            if ticks % push_every == 0 {
                let elapsed = clock.uptime().saturating_sub(started);
                let status = Status::watering(self.duration, elapsed);
                let _ = reporter.report(&status);
                info!(
                    "Session: time watered: {}. Time left: {}",
                    format_std_duration(elapsed),
                    format_std_duration(self.duration.saturating_sub(elapsed))
                );
            }
        }

        guard.release()?;
        Ok(())
    }
}
