//! Application boundary: port traits and the events the update pipeline
//! emits.
//!
//! Everything the pipeline needs from the outside world is a trait in
//! [`ports`], so the domain in [`crate::ota`] runs unchanged against ESP-IDF
//! adapters or host-side mocks.

pub mod events;
pub mod ports;
