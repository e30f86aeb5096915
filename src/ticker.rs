//! Fixed-cadence ticker on the monotonic clock.
//!
//! Deadlines are computed from the start, not from the end of the previous
//! tick's work, so slow work does not stretch the cadence.  If the caller
//! falls more than a whole period behind, missed ticks are dropped.

use std::time::Duration;

use crate::app::ports::{Clock, Wake};
use crate::cancel::CancellationToken;

pub struct Ticker {
    period: Duration,
    next: Duration,
}

impl Ticker {
    /// First tick fires one `period` from now.
    pub fn new(clock: &dyn Clock, period: Duration) -> Self {
        Self {
            period,
            next: clock.uptime() + period,
        }
    }

    /// Wait for the next tick or cancellation.
    pub fn tick(&mut self, clock: &dyn Clock, cancel: &CancellationToken) -> Wake {
        let wait = self.next.saturating_sub(clock.uptime());
        let wake = if wait.is_zero() {
            if cancel.is_cancelled() {
                Wake::Cancelled
            } else {
                Wake::Elapsed
            }
        } else {
            clock.sleep(wait, cancel)
        };

        self.next += self.period;
        let now = clock.uptime();
        if self.next <= now {
            self.next = now + self.period;
        }
        wake
    }
}
