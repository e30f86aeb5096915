//! Controller: the hexagonal core's public face.
//!
//! [`Controller::start`] resolves the pins, makes sure a durable due time
//! exists, and spawns the scheduler loop on its own thread.  After that the
//! caller only queries ([`Controller::readings`]) and finally shuts down
//! ([`Controller::close`]).
//!
//! ```text
//!   Board ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!             │  Controller                 │
//!   Store ◀──▶│   └─ "water-scheduler" thread│ ──▶ StatusDisplay
//!             │        └─ SessionController │
//!   Clock ──▶ └─────────────────────────────┘
//! ```
//!
//! Faults the scheduler cannot recover from (an unpersisted advance, a pump
//! that will not switch off) go to the fatal hook.  The default hook logs
//! and terminates the process.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::adapters::display::LogDisplay;
use crate::adapters::file_store::FileScheduleStore;
use crate::adapters::log_sink::LogEventSink;
use crate::adapters::time::SystemClock;
use crate::cancel::CancellationToken;
use crate::config::WateringConfig;
use crate::error::Error;
use crate::scheduler::{SchedulerPorts, WaterScheduler, next_due};
use crate::session::{PumpLine, SessionController};
use crate::status::{Readings, RuntimeState, Status, StatusProbe, StatusReporter};

use super::events::AppEvent;
use super::ports::{Board, Clock, EventSink, ScheduleStore, StatusDisplay};

/// Called from the scheduler thread when it stops on an unrecoverable fault.
pub type FatalHook = Box<dyn Fn(&Error) + Send + Sync>;

/// Default fatal hook: log and exit with status 1.
pub fn exit_on_fatal(error: &Error) {
    error!("Controller: fatal: {error}, terminating");
    std::process::exit(1);
}

/// Everything the controller talks to besides the board.
pub struct Ports {
    pub store: Arc<dyn ScheduleStore>,
    pub clock: Arc<dyn Clock>,
    pub display: Box<dyn StatusDisplay>,
    pub events: Box<dyn EventSink>,
    pub on_fatal: FatalHook,
}

impl Ports {
    /// Production wiring: `time.txt` under `data_dir`, the system clock,
    /// log-backed display and events, exit on fatal.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(FileScheduleStore::new(data_dir.into())),
            clock: Arc::new(SystemClock::new()),
            display: Box::new(LogDisplay::new()),
            events: Box::new(LogEventSink::new()),
            on_fatal: Box::new(exit_on_fatal),
        }
    }
}

pub struct Controller<O: OutputPin> {
    pump: Arc<PumpLine<O>>,
    probe: StatusProbe,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<O: OutputPin + Send + 'static> Controller<O> {
    /// Build the controller and start the scheduler loop.
    ///
    /// Fails if the config is invalid, either pin cannot be resolved, the
    /// pump cannot be driven low, or no due time can be made durable.
    pub fn start<B>(config: WateringConfig, board: &mut B, ports: Ports) -> Result<Self, Error>
    where
        B: Board<Output = O>,
    {
        config.validate()?;

        let sense = board.input_pin(&config.sense_pin)?;
        let pump = Arc::new(PumpLine::new(board.output_pin(&config.pump_pin)?));
        pump.deassert()?;

        let Ports {
            store,
            clock,
            display,
            mut events,
            on_fatal,
        } = ports;

        store.ensure_initialized(next_due(clock.now(), config.interval()))?;
        let next = store.read_next_time().ok();

        let probe = StatusProbe::new(store.clone(), clock.clone(), config.duration());
        let session = SessionController::new(
            sense,
            Arc::clone(&pump),
            clock.clone(),
            probe.clone(),
            config.duration(),
            config.timing,
        );

        info!(
            "Controller: pump on pin {}, sense on pin {}, board {}",
            config.pump_pin, config.sense_pin, config.board
        );
        events.emit(&AppEvent::Started { next_due: next });

        let mut scheduler = WaterScheduler::new(
            session,
            SchedulerPorts {
                store,
                clock,
                probe: probe.clone(),
                reporter: StatusReporter::new(display),
                events,
            },
            &config,
        );

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let worker = thread::Builder::new()
            .name("water-scheduler".into())
            .spawn(move || {
                if let Err(e) = scheduler.run(&token) {
                    on_fatal(&e);
                }
            })
            .map_err(|e| Error::Spawn(e.kind()))?;

        Ok(Self {
            pump,
            probe,
            cancel,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Current readings.  Never fails; an unreadable schedule is reported
    /// under the `"error"` key.
    pub fn readings(&self) -> Readings {
        self.probe.readings()
    }

    pub fn status(&self) -> Status {
        self.probe.current()
    }

    pub fn runtime(&self) -> RuntimeState {
        self.probe.runtime()
    }

    pub fn is_watering(&self) -> bool {
        self.probe.is_watering()
    }

    /// Stop the scheduler and leave the pump off.
    ///
    /// Idempotent.  The pump is locked out before the loop is joined, so it
    /// goes low even while a session is still unwinding.
    pub fn close(&self) -> Result<(), Error> {
        if self.cancel.cancel() {
            info!("Controller: closing");
        }
        let locked = self.pump.lock_out();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                // Closed from the fatal hook; the loop is already unwinding.
            } else if worker.join().is_err() {
                error!("Controller: scheduler thread panicked");
            }
        }

        locked.map_err(|fault| {
            error!("Controller: could not switch pump off: {fault}");
            Error::Actuator(fault)
        })
    }
}

impl<O: OutputPin> Drop for Controller<O> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.pump.lock_out();
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}
