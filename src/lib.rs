//! Bonsai watering controller library.
//!
//! Waters on a fixed interval for a fixed duration, gating the pump on a
//! moisture/float sense input, and keeps the next due time on disk so the
//! schedule survives restarts.  Exposes the core and its adapters for the
//! host binary and for integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod cancel;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod ticker;

pub use app::service::{Controller, Ports};
pub use config::WateringConfig;
pub use error::{Error, Result};
