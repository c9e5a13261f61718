//! Outbound update events.
//!
//! The [`UpdateService`](crate::ota::service::UpdateService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, publish over
//! MQTT, etc.

use crate::ota::session::{ErrorMessage, Ingestion, UpdateStatus};

/// Structured events emitted by the update pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A session opened the flash sink and is accepting bytes.
    Started { path: Ingestion, total_size: u32 },

    /// Progress crossed another 10 % step.
    Progress { percent: u8, bytes_written: u32 },

    /// The session moved between states.
    StatusChanged { from: UpdateStatus, to: UpdateStatus },

    /// The session ended in `Error`; carries the recorded message.
    Failed(ErrorMessage),

    /// A fetch request was queued for the main loop.
    FetchQueued,

    /// The image was committed; restart is due at `reboot_at_ms`.
    RebootScheduled { reboot_at_ms: u64 },

    /// The restart primitive is about to run.
    Rebooting,
}
