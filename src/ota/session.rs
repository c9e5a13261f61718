//! Update session: the state machine for one firmware update attempt.
//!
//! ```text
//!        reserve()               open() ok
//!  Idle ───────────▶ Starting ───────────────▶ Uploading / Fetching
//!   ▲                   │ open fails               │  │ write_chunk()*
//!   │                   ▼                          │  ▼
//!   │                 Error ◀── write/finalize ────┤ Finishing (all bytes in)
//!   │                   ▲        failure           │  │ finalize()
//!   │                   │                          ▼  ▼
//!   └── start() ── Cancelled ◀──── cancel() ────  Success ── reboot armed
//! ```
//!
//! The session owns the [`FlashSink`] for its whole lifetime.  Any failure
//! aborts the sink, so a half-written image can never be committed.  The
//! record itself is never dropped; `start()` resets it.
//!
//! `start()` is `reserve()` followed by `open()`.  A remote fetch reserves
//! the session when it is queued and opens it once the response headers
//! are in, so the session stays busy in between.

use core::fmt::Write as _;

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{DevicePort, FlashSink};
use crate::config::UpdateConfig;
use crate::drivers::led_patterns::LedStatus;
use crate::error::{Result, UpdateError};

use super::reboot::RebootScheduler;
use super::status::{StatusSnapshot, progress_percent};

/// First byte of every ESP application image.
pub const IMAGE_MAGIC: u8 = 0xE9;

/// Bounded human-readable error text.
pub type ErrorMessage = heapless::String<64>;

// ── Status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Idle,
    Starting,
    Uploading,
    Fetching,
    Finishing,
    Success,
    Error,
    Cancelled,
}

impl UpdateStatus {
    /// A session in one of these states owns the flash sink.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Uploading | Self::Fetching | Self::Finishing
        )
    }

    /// States in which `write_chunk` is accepted.
    pub fn is_receiving(self) -> bool {
        matches!(self, Self::Uploading | Self::Fetching)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Uploading => "uploading",
            Self::Fetching => "fetching",
            Self::Finishing => "finishing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Which ingestion path owns the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingestion {
    Upload,
    Fetch,
}

// ── Session ───────────────────────────────────────────────────

pub struct UpdateSession<F: FlashSink> {
    flash: F,
    flash_open: bool,
    status: UpdateStatus,
    path: Option<Ingestion>,
    bytes_written: u32,
    total_size: u32,
    error_message: Option<ErrorMessage>,
    started_at_ms: u64,
    generation: u32,
    reboot: RebootScheduler,
    reboot_delay_ms: u32,
    max_firmware_size: u32,
}

impl<F: FlashSink> UpdateSession<F> {
    pub fn new(flash: F, config: &UpdateConfig) -> Self {
        Self {
            flash,
            flash_open: false,
            status: UpdateStatus::Idle,
            path: None,
            bytes_written: 0,
            total_size: 0,
            error_message: None,
            started_at_ms: 0,
            generation: 0,
            reboot: RebootScheduler::new(),
            reboot_delay_ms: config.reboot_delay_ms,
            max_firmware_size: config.max_firmware_size,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> UpdateStatus {
        self.status
    }

    pub fn ingestion(&self) -> Option<Ingestion> {
        self.path
    }

    pub fn bytes_written(&self) -> u32 {
        self.bytes_written
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorMessage> {
        self.error_message.as_ref()
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    /// Bumped on every `start()` so a request can tell whether the session
    /// it opened is still the current one.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn reboot_at(&self) -> Option<u64> {
        self.reboot.reboot_at()
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Immutable copy of the session for status polling.
    pub fn snapshot(&self, now_ms: u64) -> StatusSnapshot {
        let in_progress = self.status.is_active();
        StatusSnapshot {
            in_progress,
            status: self.status,
            progress: progress_percent(self.status, self.bytes_written, self.total_size),
            bytes_written: self.bytes_written,
            total_size: self.total_size,
            error: self.error_message.clone().unwrap_or_default(),
            elapsed: if in_progress {
                now_ms.saturating_sub(self.started_at_ms)
            } else {
                0
            },
        }
    }

    // ── Transitions ───────────────────────────────────────────

    /// Begin a new session.  `total_size == 0` means unknown, which only
    /// the upload path may use.
    pub fn start(
        &mut self,
        total_size: u32,
        path: Ingestion,
        device: &mut impl DevicePort,
        now_ms: u64,
    ) -> Result<()> {
        self.reserve(path, now_ms)?;
        self.open(total_size, device)
    }

    /// Claim the session for `path` without touching flash.  The session is
    /// active (`Starting`) from here on, so no other ingestion can start.
    pub fn reserve(&mut self, path: Ingestion, now_ms: u64) -> Result<()> {
        if self.status.is_active() || self.reboot.is_pending() {
            warn!("OTA: start rejected, session {} busy", self.status.as_str());
            return Err(UpdateError::SessionBusy);
        }
        self.reset(path, now_ms);
        self.status = UpdateStatus::Starting;
        Ok(())
    }

    /// Open the flash sink for a reserved session and start receiving.
    pub fn open(&mut self, total_size: u32, device: &mut impl DevicePort) -> Result<()> {
        let (UpdateStatus::Starting, Some(path)) = (self.status, self.path) else {
            return Err(UpdateError::NotReceiving);
        };
        self.total_size = total_size;

        if path == Ingestion::Fetch && total_size == 0 {
            return Err(self.fail(UpdateError::MissingContentLength));
        }
        if total_size > self.max_firmware_size {
            return Err(self.fail(UpdateError::ImageTooLarge));
        }

        device.stop_animation();
        device.set_status_indicator(LedStatus::Update);

        let size_hint = (total_size > 0).then_some(total_size);
        if let Err(e) = self.flash.begin(size_hint) {
            return Err(self.fail(UpdateError::FlashOpenFailed(e)));
        }
        self.flash_open = true;

        self.status = match path {
            Ingestion::Upload => UpdateStatus::Uploading,
            Ingestion::Fetch => UpdateStatus::Fetching,
        };
        info!("OTA: {:?} session started ({} bytes)", path, total_size);
        Ok(())
    }

    /// Append a chunk.  Returns the running byte count.
    pub fn write_chunk(&mut self, data: &[u8], device: &mut impl DevicePort) -> Result<u32> {
        if !self.status.is_receiving() {
            return Err(UpdateError::NotReceiving);
        }

        if self.bytes_written == 0 && data.first() != Some(&IMAGE_MAGIC) {
            return Err(self.fail(UpdateError::InvalidSignature));
        }

        let Some(new_written) = u32::try_from(data.len())
            .ok()
            .and_then(|len| self.bytes_written.checked_add(len))
        else {
            return Err(self.fail(UpdateError::Overflow));
        };
        if self.total_size > 0 && new_written > self.total_size {
            return Err(self.fail(UpdateError::Overflow));
        }

        if let Err(e) = self.flash.write(data) {
            return Err(self.fail(UpdateError::WriteFailed(e)));
        }

        self.bytes_written = new_written;
        device.update_status_indicator();

        if self.total_size > 0 && self.bytes_written == self.total_size {
            self.status = UpdateStatus::Finishing;
        }
        Ok(self.bytes_written)
    }

    /// Fix the image size once the transfer knows it (upload end event).
    /// A size already declared must match.
    pub fn declare_total(&mut self, total_size: u32) -> Result<()> {
        if !self.status.is_active() {
            return Err(UpdateError::NotReceiving);
        }
        if self.total_size != 0 && self.total_size != total_size {
            return Err(UpdateError::SizeMismatch);
        }
        if total_size > self.max_firmware_size {
            return Err(self.fail(UpdateError::ImageTooLarge));
        }
        self.total_size = total_size;
        if self.status.is_receiving() && self.bytes_written == total_size {
            self.status = UpdateStatus::Finishing;
        }
        Ok(())
    }

    /// Commit the image and arm the reboot timer.
    pub fn finalize(&mut self, now_ms: u64) -> Result<()> {
        if !matches!(
            self.status,
            UpdateStatus::Uploading | UpdateStatus::Fetching | UpdateStatus::Finishing
        ) {
            return Err(UpdateError::NotReceiving);
        }
        if self.total_size == 0 {
            // Unknown size: whatever arrived is the image, provided something did.
            if self.bytes_written == 0 {
                return Err(self.fail(UpdateError::SizeMismatch));
            }
            self.total_size = self.bytes_written;
        }
        if self.bytes_written != self.total_size {
            return Err(self.fail(UpdateError::SizeMismatch));
        }

        self.status = UpdateStatus::Finishing;
        let committed = self.flash.end();
        self.flash_open = false;
        if let Err(e) = committed {
            return Err(self.fail(UpdateError::FinalizeFailed(e)));
        }

        self.status = UpdateStatus::Success;
        self.reboot.arm(now_ms, self.reboot_delay_ms);
        info!(
            "OTA: image committed ({} bytes), reboot in {} ms",
            self.bytes_written, self.reboot_delay_ms
        );
        Ok(())
    }

    /// User-initiated stop.  Returns `false` when nothing was running.
    pub fn cancel(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.abort_flash();
        self.status = UpdateStatus::Cancelled;
        self.record(UpdateError::UserCancelled);
        warn!("OTA: cancelled by user after {} bytes", self.bytes_written);
        true
    }

    /// Terminate the active session with `err`.  Aborts the sink and
    /// returns `err` for propagation.  A no-op on an inactive session.
    pub fn fail(&mut self, err: UpdateError) -> UpdateError {
        if !self.status.is_active() {
            return err;
        }
        self.abort_flash();
        self.status = UpdateStatus::Error;
        self.record(err);
        warn!("OTA: failed: {}", err);
        err
    }

    /// Consume the reboot deadline if it has passed.
    pub fn take_due_reboot(&mut self, now_ms: u64) -> bool {
        self.reboot.take_due(now_ms)
    }

    // ── Internal ──────────────────────────────────────────────

    fn reset(&mut self, path: Ingestion, now_ms: u64) {
        self.generation = self.generation.wrapping_add(1);
        self.path = Some(path);
        self.bytes_written = 0;
        self.total_size = 0;
        self.error_message = None;
        self.started_at_ms = now_ms;
    }

    fn abort_flash(&mut self) {
        if self.flash_open {
            self.flash.abort();
            self.flash_open = false;
        }
    }

    fn record(&mut self, err: UpdateError) {
        let mut msg = ErrorMessage::new();
        // Messages are sized to fit; a longer one is cut at the capacity.
        let _ = write!(msg, "{}", err);
        self.error_message = Some(msg);
    }
}
