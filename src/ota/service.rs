//! Update service: the core of the update pipeline.
//!
//! [`UpdateService`] owns the session, the firmware source and the fetch
//! job.  Every entry point takes the ports it needs at the call site, so
//! the whole pipeline runs on the host against mocks.
//!
//! ```text
//!  HTTP handlers ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                    │      UpdateService       │
//!  main loop     ──▶ │  Session · Fetch · Reboot│ ──▶ FlashSink / DevicePort
//!   poll()/tick()    └──────────────────────────┘
//! ```

use log::info;

use crate::app::events::UpdateEvent;
use crate::app::ports::{DevicePort, EventSink, FirmwareSource, FlashSink, TimePort};
use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};

use super::fetch::{FetchJob, FetchStep, FetchUrl};
use super::session::{Ingestion, UpdateSession, UpdateStatus};
use super::status::{StatusSnapshot, progress_percent};
use super::upload::{UploadEvent, UploadRequest};

/// What the reporter compares against after each operation.
#[derive(Debug, Clone, Copy)]
struct Observed {
    status: UpdateStatus,
    generation: u32,
}

pub struct UpdateService<F: FlashSink, S: FirmwareSource> {
    session: UpdateSession<F>,
    source: S,
    fetch: FetchJob<S::Body>,
    /// Highest 10 % step already reported for the current session.
    last_decile: u8,
}

impl<F: FlashSink, S: FirmwareSource> UpdateService<F, S> {
    pub fn new(flash: F, source: S, config: &UpdateConfig) -> Self {
        Self {
            session: UpdateSession::new(flash, config),
            source,
            fetch: FetchJob::new(config.fetch_chunk_size),
            last_decile: 0,
        }
    }

    // ── Session operations ────────────────────────────────────

    pub fn start(
        &mut self,
        total_size: u32,
        path: Ingestion,
        hw: &mut (impl DevicePort + TimePort),
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let before = self.observe();
        let now = hw.uptime_ms();
        let res = self.session.start(total_size, path, hw, now);
        self.report(before, sink);
        res
    }

    pub fn write_chunk(
        &mut self,
        data: &[u8],
        hw: &mut impl DevicePort,
        sink: &mut impl EventSink,
    ) -> Result<u32> {
        let before = self.observe();
        let res = self.session.write_chunk(data, hw);
        self.report(before, sink);
        res
    }

    pub fn finalize(&mut self, hw: &impl TimePort, sink: &mut impl EventSink) -> Result<()> {
        let before = self.observe();
        let res = self.session.finalize(hw.uptime_ms());
        self.report(before, sink);
        res
    }

    /// Terminate the active session with `err`.
    pub fn fail(&mut self, err: UpdateError, sink: &mut impl EventSink) -> UpdateError {
        let before = self.observe();
        let err = self.session.fail(err);
        self.report(before, sink);
        err
    }

    /// Cancel whatever is running, including a queued or streaming fetch.
    pub fn cancel(&mut self, sink: &mut impl EventSink) -> bool {
        let before = self.observe();
        let had_fetch = self.fetch.is_busy();
        self.fetch.cancel();
        let cancelled = self.session.cancel();
        self.report(before, sink);
        cancelled || had_fetch
    }

    // ── Direct upload ─────────────────────────────────────────

    pub fn handle_upload(
        &mut self,
        request: &mut UploadRequest,
        event: UploadEvent<'_>,
        hw: &mut (impl DevicePort + TimePort),
        sink: &mut impl EventSink,
    ) {
        let before = self.observe();
        request.handle(event, &mut self.session, hw);
        self.report(before, sink);
    }

    pub fn reject_upload(
        &mut self,
        request: &mut UploadRequest,
        err: UpdateError,
        sink: &mut impl EventSink,
    ) {
        let before = self.observe();
        request.reject(err, &mut self.session);
        self.report(before, sink);
    }

    // ── Remote fetch ──────────────────────────────────────────

    /// Reserve the session for a remote fetch and queue it for the main
    /// loop.  From here until the job finishes the session is `Starting` or
    /// later, so uploads are refused and cancel applies.
    pub fn request_fetch(
        &mut self,
        url: FetchUrl,
        hw: &impl TimePort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.fetch.is_busy() {
            return Err(UpdateError::SessionBusy);
        }
        let before = self.observe();
        self.session.reserve(Ingestion::Fetch, hw.uptime_ms())?;
        self.fetch.queue(url);
        sink.emit(&UpdateEvent::FetchQueued);
        self.report(before, sink);
        Ok(())
    }

    pub fn fetch_pending(&self) -> bool {
        self.fetch.is_busy()
    }

    /// One cooperative step of the fetch job.  Cheap when nothing is queued.
    pub fn poll(&mut self, hw: &mut (impl DevicePort + TimePort), sink: &mut impl EventSink) -> FetchStep {
        if !self.fetch.is_busy() {
            return FetchStep::Idle;
        }
        let before = self.observe();
        let step = self.fetch.step(&mut self.source, &mut self.session, hw);
        self.report(before, sink);
        step
    }

    // ── Reboot ────────────────────────────────────────────────

    /// Restart the device once the reboot deadline has passed.
    pub fn tick(&mut self, hw: &mut (impl DevicePort + TimePort), sink: &mut impl EventSink) -> bool {
        if !self.session.take_due_reboot(hw.uptime_ms()) {
            return false;
        }
        sink.emit(&UpdateEvent::Rebooting);
        info!("OTA: restarting into new image");
        hw.restart();
        true
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self, now_ms: u64) -> StatusSnapshot {
        self.session.snapshot(now_ms)
    }

    pub fn session(&self) -> &UpdateSession<F> {
        &self.session
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    // ── Reporting ─────────────────────────────────────────────

    fn observe(&self) -> Observed {
        Observed {
            status: self.session.status(),
            generation: self.session.generation(),
        }
    }

    fn report(&mut self, before: Observed, sink: &mut impl EventSink) {
        let now = self.observe();
        let new_session = now.generation != before.generation;
        if new_session {
            self.last_decile = 0;
        }

        if now.status != before.status || new_session {
            sink.emit(&UpdateEvent::StatusChanged {
                from: before.status,
                to: now.status,
            });
            match now.status {
                UpdateStatus::Uploading | UpdateStatus::Fetching => {
                    if let Some(path) = self.session.ingestion() {
                        sink.emit(&UpdateEvent::Started {
                            path,
                            total_size: self.session.total_size(),
                        });
                    }
                }
                UpdateStatus::Error => {
                    let msg = self.session.error().cloned().unwrap_or_default();
                    sink.emit(&UpdateEvent::Failed(msg));
                }
                UpdateStatus::Success => {
                    if let Some(reboot_at_ms) = self.session.reboot_at() {
                        sink.emit(&UpdateEvent::RebootScheduled { reboot_at_ms });
                    }
                }
                _ => {}
            }
        }

        if now.status.is_active() {
            let pct = progress_percent(
                now.status,
                self.session.bytes_written(),
                self.session.total_size(),
            );
            let decile = pct / 10;
            if decile > self.last_decile {
                self.last_decile = decile;
                sink.emit(&UpdateEvent::Progress {
                    percent: decile * 10,
                    bytes_written: self.session.bytes_written(),
                });
            }
        }
    }
}
