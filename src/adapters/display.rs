//! Display adapter that renders the two status lines to the log.
//!
//! Stands in for a two-line character display on hosts that have none.

use log::info;

use crate::app::ports::{DisplayError, StatusDisplay};
use crate::status::StatusLines;

#[derive(Debug, Default)]
pub struct LogDisplay;

impl LogDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl StatusDisplay for LogDisplay {
    fn show(&mut self, lines: &StatusLines) -> Result<(), DisplayError> {
        info!("DISPLAY | {} | {}", lines.line1, lines.line2);
        Ok(())
    }
}
