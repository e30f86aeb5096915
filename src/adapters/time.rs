//! Time adapters.
//!
//! - [`SystemClock`]: wall clock from `chrono::Utc::now()`, uptime from
//!   `std::time::Instant`, sleeps block on the cancellation token.
//! - [`ManualClock`]: simulated time for host tests and dry runs.  Sleeping
//!   advances virtual time instantly, so a 5 s scheduler wake or a 100 ms
//!   sample tick costs nothing.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};

use crate::app::ports::{Clock, Wake};
use crate::cancel::CancellationToken;

// ───────────────────────────────────────────────────────────────
// SystemClock
// ───────────────────────────────────────────────────────────────

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, period: Duration, cancel: &CancellationToken) -> Wake {
        if cancel.wait_timeout(period) {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ManualClock
// ───────────────────────────────────────────────────────────────

type SleepHook = Box<dyn FnMut(Duration) + Send>;

struct ManualState {
    wall: DateTime<Utc>,
    uptime: Duration,
}

/// Simulated clock.  Wall time and uptime advance together.
pub struct ManualClock {
    state: Mutex<ManualState>,
    hook: Mutex<Option<SleepHook>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                wall: start,
                uptime: Duration::ZERO,
            }),
            hook: Mutex::new(None),
        }
    }

    /// Simulated clock starting at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state();
        state.uptime += by;
        state.wall += TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
    }

    /// Step the wall clock alone, as an NTP correction would.
    pub fn step_wall(&self, by: TimeDelta) {
        self.state().wall += by;
    }

    /// Run `hook` after every simulated sleep, with the new uptime.
    ///
    /// The hook may read the clock and fire cancellation tokens; the sleep
    /// reports [`Wake::Cancelled`] if the token it was given fired.
    pub fn on_sleep(&self, hook: impl FnMut(Duration) + Send + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state().wall
    }

    fn uptime(&self) -> Duration {
        self.state().uptime
    }

    fn sleep(&self, period: Duration, cancel: &CancellationToken) -> Wake {
        if cancel.is_cancelled() {
            return Wake::Cancelled;
        }
        self.advance(period);

        let uptime = self.uptime();
        if let Some(hook) = self
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            hook(uptime);
        }

        if cancel.is_cancelled() {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        }
    }
}
