//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing update events to the ESP-IDF logger
//! (UART / USB-CDC in production).  An MQTT publisher would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::UpdateEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`UpdateEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &UpdateEvent) {
        match event {
            UpdateEvent::Started { path, total_size } => {
                info!("OTA | start | path={:?} size={}", path, total_size);
            }
            UpdateEvent::Progress {
                percent,
                bytes_written,
            } => {
                info!("OTA | progress | {}% ({} bytes)", percent, bytes_written);
            }
            UpdateEvent::StatusChanged { from, to } => {
                info!("OTA | status | {} -> {}", from.as_str(), to.as_str());
            }
            UpdateEvent::Failed(msg) => {
                warn!("OTA | error | {}", msg);
            }
            UpdateEvent::FetchQueued => {
                info!("OTA | fetch queued");
            }
            UpdateEvent::RebootScheduled { reboot_at_ms } => {
                info!("OTA | reboot scheduled at t={}ms", reboot_at_ms);
            }
            UpdateEvent::Rebooting => {
                info!("OTA | rebooting");
            }
        }
    }
}
