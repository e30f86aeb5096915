//! Status reporting.
//!
//! [`Status`] is the closed set of states the controller can report.  It is
//! rendered two ways: as two short text lines for the external display, and
//! as a string-keyed [`Readings`] map at the query boundary.
//!
//! [`StatusProbe`] answers "what is the controller doing right now" from the
//! transient runtime state (set while a session is in flight) and the
//! durable schedule (read otherwise).  It is cheap to clone and safe to call
//! from any thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use serde_json::Value;

use crate::app::ports::{Clock, DisplayError, ScheduleStore, StatusDisplay, StoreError};

/// Readings key while a session is in flight.
pub const KEY_WATER_TIME_LEFT: &str = "water time left";
/// Readings key for the next due time while idle.
pub const KEY_NEXT_WATER_TIME: &str = "next water time";
/// Readings key for the countdown while idle.
pub const KEY_TIME_TILL_NEXT: &str = "time till next water";
/// Readings key carrying the store error when the schedule is unreadable.
pub const KEY_ERROR: &str = "error";

/// Display line capacity (a 128 px wide display fits ~18 glyphs; keep slack).
pub const LINE_CAPACITY: usize = 32;

/// String-keyed readings returned to the host.
pub type Readings = serde_json::Map<String, Value>;

// ───────────────────────────────────────────────────────────────
// Status
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// A session is in flight.
    Watering { remaining: Duration },
    /// Waiting for the next due time.  `time_until` is negative when overdue.
    Idle {
        next_time: DateTime<Utc>,
        time_until: TimeDelta,
    },
    /// Idle, but the schedule store could not be read.
    Unscheduled(StoreError),
}

impl Status {
    /// Remaining time of a session of `duration` that has run for `elapsed`.
    pub fn watering(duration: Duration, elapsed: Duration) -> Self {
        Self::Watering {
            remaining: duration.saturating_sub(elapsed),
        }
    }

    pub fn idle(next_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::Idle {
            next_time,
            time_until: next_time - now,
        }
    }

    /// The two display lines for this status.
    pub fn lines(&self) -> StatusLines {
        match self {
            Self::Watering { remaining } => {
                StatusLines::new("Time left:", &format_std_duration(*remaining))
            }
            Self::Idle { time_until, .. } => {
                StatusLines::new("Time till water:", &format_delta(*time_until))
            }
            Self::Unscheduled(_) => StatusLines::new("Time till water:", "unknown"),
        }
    }

    /// The query-boundary representation.
    pub fn readings(&self) -> Readings {
        let mut map = Readings::new();
        match self {
            Self::Watering { remaining } => {
                map.insert(
                    KEY_WATER_TIME_LEFT.into(),
                    Value::String(format_std_duration(*remaining)),
                );
            }
            Self::Idle {
                next_time,
                time_until,
            } => {
                map.insert(
                    KEY_NEXT_WATER_TIME.into(),
                    Value::String(format_rfc1123(*next_time)),
                );
                map.insert(
                    KEY_TIME_TILL_NEXT.into(),
                    Value::String(format_delta(*time_until)),
                );
            }
            Self::Unscheduled(err) => {
                map.insert(KEY_NEXT_WATER_TIME.into(), Value::String("unavailable".into()));
                map.insert(KEY_ERROR.into(), Value::String(err.to_string()));
            }
        }
        map
    }
}

// ───────────────────────────────────────────────────────────────
// Display lines
// ───────────────────────────────────────────────────────────────

/// Two fixed-capacity text lines.  Longer input is truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLines {
    pub line1: heapless::String<LINE_CAPACITY>,
    pub line2: heapless::String<LINE_CAPACITY>,
}

impl StatusLines {
    pub fn new(line1: &str, line2: &str) -> Self {
        Self {
            line1: truncated(line1),
            line2: truncated(line2),
        }
    }
}

fn truncated(text: &str) -> heapless::String<LINE_CAPACITY> {
    let mut out = heapless::String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Formatting
// ───────────────────────────────────────────────────────────────

/// Round to whole seconds, halves away from zero.
pub fn round_to_secs(delta: TimeDelta) -> i64 {
    let ms = delta.num_milliseconds();
    if ms >= 0 { (ms + 500) / 1000 } else { (ms - 500) / 1000 }
}

/// Compact duration: `0s`, `45s`, `1m30s`, `2h0m5s`, `-12s`.
pub fn format_secs(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let total = secs.unsigned_abs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{sign}{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{sign}{m}m{s}s")
    } else {
        format!("{sign}{s}s")
    }
}

pub fn format_delta(delta: TimeDelta) -> String {
    format_secs(round_to_secs(delta))
}

pub fn format_std_duration(duration: Duration) -> String {
    format_delta(TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX))
}

/// `Mon, 02 Jan 2006 15:04:05 UTC`
pub fn format_rfc1123(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S UTC").to_string()
}

// ───────────────────────────────────────────────────────────────
// Runtime state + probe
// ───────────────────────────────────────────────────────────────

/// Transient, in-memory only.  Set while a session is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeState {
    pub is_watering: bool,
    /// Wall-clock start of the current session.
    pub watering_started_at: Option<DateTime<Utc>>,
    /// Monotonic start of the current session, used for remaining time.
    pub started_uptime: Duration,
}

/// Thread-safe view of the controller's current status.
#[derive(Clone)]
pub struct StatusProbe {
    runtime: Arc<Mutex<RuntimeState>>,
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    duration: Duration,
}

impl StatusProbe {
    pub fn new(store: Arc<dyn ScheduleStore>, clock: Arc<dyn Clock>, duration: Duration) -> Self {
        Self {
            runtime: Arc::new(Mutex::new(RuntimeState::default())),
            store,
            clock,
            duration,
        }
    }

    fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn runtime(&self) -> RuntimeState {
        *self.state()
    }

    pub fn is_watering(&self) -> bool {
        self.state().is_watering
    }

    /// Configured session length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Mark a session as started now.
    pub fn begin_watering(&self) {
        let mut state = self.state();
        state.is_watering = true;
        state.watering_started_at = Some(self.clock.now());
        state.started_uptime = self.clock.uptime();
    }

    /// Mark the current session as finished.
    pub fn end_watering(&self) {
        let mut state = self.state();
        state.is_watering = false;
        state.watering_started_at = None;
    }

    /// Current status.  Never fails: an unreadable schedule is reported as
    /// [`Status::Unscheduled`].
    pub fn current(&self) -> Status {
        let runtime = self.runtime();
        if runtime.is_watering {
            let elapsed = self.clock.uptime().saturating_sub(runtime.started_uptime);
            return Status::watering(self.duration, elapsed);
        }
        match self.store.read_next_time() {
            Ok(next) => Status::idle(next, self.clock.now()),
            Err(e) => Status::Unscheduled(e),
        }
    }

    pub fn readings(&self) -> Readings {
        self.current().readings()
    }
}

// ───────────────────────────────────────────────────────────────
// Reporter
// ───────────────────────────────────────────────────────────────

/// Pushes status lines to the external display.
///
/// Display failures are logged and returned, never escalated: display
/// unavailability must not affect watering.
pub struct StatusReporter {
    display: Box<dyn StatusDisplay>,
}

impl StatusReporter {
    pub fn new(display: Box<dyn StatusDisplay>) -> Self {
        Self { display }
    }

    pub fn report(&mut self, status: &Status) -> Result<(), DisplayError> {
        let lines = status.lines();
        self.display.show(&lines).inspect_err(|e| {
            warn!("StatusReporter: error pushing stats: {e}");
        })
    }
}
