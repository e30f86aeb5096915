//! Cooperative cancellation.
//!
//! One token per controller.  Cloning hands out another observer; the
//! underlying channel's sender is dropped exactly once by [`cancel`], which
//! disconnects every receiver at the same moment.  Sleepers blocked in
//! [`wait_timeout`] wake immediately.
//!
//! [`cancel`]: CancellationToken::cancel
//! [`wait_timeout`]: CancellationToken::wait_timeout

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

#[derive(Debug, Clone)]
pub struct CancellationToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    observer: Receiver<()>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            observer: rx,
        }
    }

    /// Fire the token.  Returns `true` only for the call that actually fired it.
    pub fn cancel(&self) -> bool {
        let sender = self
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        sender.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.observer.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block for up to `timeout`.  Returns `true` if the token fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.observer.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            // Nothing is ever sent, so any other outcome means the sender is gone.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}
