//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the update pipeline end to
//! end against mock adapters.  Everything runs on the host.

mod api_tests;
mod mock_ports;
mod upload_flow_tests;
