//! Port traits: the hexagonal boundary between the update pipeline and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ UpdateService (domain)
//! ```
//!
//! Driven adapters (flash, HTTP client, device hooks, clock, event sinks)
//! implement these traits.  The update pipeline consumes them via generics,
//! so the domain core never touches ESP-IDF directly and every path can be
//! exercised on the host with mocks.
//!
//! ## Safety notes
//!
//! - **FlashSink** implementations MUST leave the running image untouched
//!   until [`FlashSink::end`] commits; `abort` must be safe to call at any
//!   point, including when nothing is open.
//! - **FirmwareSource** implementations decide the trust policy of the
//!   outbound connection.  The ESP-IDF adapter deliberately skips server
//!   certificate verification.

use crate::drivers::led_patterns::LedStatus;
use crate::error::{FlashError, SourceError};

// ───────────────────────────────────────────────────────────────
// Flash sink (driven adapter: domain → OTA partition)
// ───────────────────────────────────────────────────────────────

/// Raw flash-write primitive.  No session semantics of its own.
pub trait FlashSink {
    /// Open the inactive OTA slot.  `None` means the image size is unknown.
    fn begin(&mut self, size_hint: Option<u32>) -> Result<(), FlashError>;

    /// Append a chunk.  Must write all of `data` or fail.
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError>;

    /// Validate and commit the image as the next boot slot.
    fn end(&mut self) -> Result<(), FlashError>;

    /// Discard whatever was written.  Idempotent.
    fn abort(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Device port (driven adapter: domain → rest of the firmware)
// ───────────────────────────────────────────────────────────────

/// Hooks into the parts of the clock firmware the update pipeline must
/// coordinate with.
pub trait DevicePort {
    /// Stop the hands animation before flash writes begin.  The animation
    /// is not resumed; the device reboots or keeps running idle.
    fn stop_animation(&mut self);

    /// Switch the status LED to a new status.
    fn set_status_indicator(&mut self, status: LedStatus);

    /// Service blinking patterns; called once per written chunk.
    fn update_status_indicator(&mut self);

    /// Restart the device.  Does not return on hardware.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait TimePort {
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Firmware source (driven adapter: domain → outbound HTTP)
// ───────────────────────────────────────────────────────────────

/// Headers of a remote firmware response plus its streaming body.
pub struct SourceResponse<B> {
    /// HTTP status after redirects were followed.
    pub status: u16,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub body: B,
}

/// Streaming response body.
pub trait BodyReader {
    /// Read up to `buf.len()` bytes.  `Ok(0)` means end of body.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;
}

/// Issues the outbound GET for a remote fetch.
pub trait FirmwareSource {
    type Body: BodyReader;

    /// Send `GET url`, following redirects, and return once headers are in.
    fn open(&mut self, url: &str) -> Result<SourceResponse<Self::Body>, SourceError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The pipeline emits structured [`UpdateEvent`](super::events::UpdateEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT, …).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::UpdateEvent);
}
