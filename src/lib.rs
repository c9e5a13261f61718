//! ClockClock firmware library.
//!
//! Exposes the update pipeline and its ports for integration testing and
//! host-side simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod app;
pub mod board;
pub mod config;
pub mod drivers;
pub mod error;
pub mod ota;
