//! Simulated board.
//!
//! Every pin is a shared boolean level.  Inputs read it, outputs write it,
//! and [`SimBoard::line`] hands out a handle so a host harness can flip the
//! sense level or watch the pump.  Pin operations never fail.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::debug;

use crate::app::ports::{Board, PinError};

/// Shared level of one simulated pin.
#[derive(Debug, Clone, Default)]
pub struct SimLine(Arc<AtomicBool>);

impl SimLine {
    pub fn level(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, high: bool) {
        self.0.store(high, Ordering::SeqCst);
    }
}

pub struct SimInput(SimLine);

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.level())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.level())
    }
}

pub struct SimOutput(SimLine);

impl ErrorType for SimOutput {
    type Error = Infallible;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

#[derive(Default)]
pub struct SimBoard {
    lines: HashMap<String, SimLine>,
    claimed: Vec<String>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on pin `id`, created low if it does not exist yet.
    pub fn line(&mut self, id: &str) -> SimLine {
        self.lines.entry(id.to_string()).or_default().clone()
    }

    fn claim(&mut self, id: &str) -> Result<SimLine, PinError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(PinError::Unknown(id.to_string()));
        }
        if self.claimed.iter().any(|c| c == id) {
            return Err(PinError::InUse(id.to_string()));
        }
        self.claimed.push(id.to_string());
        debug!("SimBoard: claimed pin {id}");
        Ok(self.line(id))
    }
}

impl Board for SimBoard {
    type Input = SimInput;
    type Output = SimOutput;

    fn input_pin(&mut self, id: &str) -> Result<SimInput, PinError> {
        self.claim(id).map(SimInput)
    }

    fn output_pin(&mut self, id: &str) -> Result<SimOutput, PinError> {
        self.claim(id).map(SimOutput)
    }
}
