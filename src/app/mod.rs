//! Application core.
//!
//! Business rules for the watering controller: the public [`service`]
//! surface, the outbound [`events`], and the [`ports`] every adapter
//! implements.  Hardware, storage and time are only reached through the
//! port traits, so the whole core runs under test with mock adapters.

pub mod events;
pub mod ports;
pub mod service;
