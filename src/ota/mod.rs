//! Firmware update pipeline.
//!
//! - [`session`]: the single update session and its state machine
//! - [`upload`] / [`multipart`]: direct upload from the browser
//! - [`fetch`]: remote download driven from the main loop
//! - [`status`]: JSON snapshot for polling clients
//! - [`reboot`]: deferred restart after a committed image
//! - [`service`]: ties the above together behind one owner

pub mod fetch;
pub mod multipart;
pub mod reboot;
pub mod service;
pub mod session;
pub mod status;
pub mod upload;

pub use service::UpdateService;
pub use session::{Ingestion, UpdateSession, UpdateStatus};
pub use status::StatusSnapshot;

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader keeps it.
///
/// Must run early in `main`.  Without it the rollback watchdog reverts to
/// the previous slot after an update.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => log::info!("OTA: running image marked valid"),
        Err(e) => log::warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    log::info!("OTA: image validation skipped (host build)");
}
