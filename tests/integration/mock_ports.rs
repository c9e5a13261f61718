//! Mock adapters for integration tests.
//!
//! Each mock records what the pipeline did to it so tests can assert on the
//! full call history without flash, WiFi or an LED.

use std::collections::VecDeque;

use clockclock::app::events::UpdateEvent;
use clockclock::app::ports::{
    BodyReader, DevicePort, EventSink, FirmwareSource, FlashSink, SourceResponse, TimePort,
};
use clockclock::drivers::led_patterns::LedStatus;
use clockclock::error::{FlashError, SourceError};
use clockclock::ota::session::IMAGE_MAGIC;

/// A plausible image: magic byte followed by filler.
pub fn image(len: usize) -> Vec<u8> {
    let mut v: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    if let Some(first) = v.first_mut() {
        *first = IMAGE_MAGIC;
    }
    v
}

// ── Flash ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockFlash {
    pub data: Vec<u8>,
    pub open: bool,
    pub begins: u32,
    pub aborts: u32,
    pub last_hint: Option<Option<u32>>,
    pub committed: Option<Vec<u8>>,
    pub fail_begin: bool,
    pub fail_write: bool,
    pub fail_end: bool,
}

#[allow(dead_code)]
impl MockFlash {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `begin` was never called.
    pub fn untouched(&self) -> bool {
        self.begins == 0 && self.data.is_empty()
    }
}

impl FlashSink for MockFlash {
    fn begin(&mut self, size_hint: Option<u32>) -> Result<(), FlashError> {
        self.begins += 1;
        self.last_hint = Some(size_hint);
        if self.fail_begin {
            return Err(FlashError::NoPartition);
        }
        self.data.clear();
        self.open = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        if !self.open {
            return Err(FlashError::NotOpen);
        }
        if self.fail_write {
            return Err(FlashError::WriteFailed);
        }
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        if !self.open {
            return Err(FlashError::NotOpen);
        }
        self.open = false;
        if self.fail_end {
            return Err(FlashError::VerifyFailed);
        }
        self.committed = Some(std::mem::take(&mut self.data));
        Ok(())
    }

    fn abort(&mut self) {
        self.open = false;
        self.aborts += 1;
    }
}

// ── Device + clock ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    StopAnimation,
    SetIndicator(LedStatus),
    UpdateIndicator,
    Restart,
}

#[derive(Debug, Default)]
pub struct MockDevice {
    pub calls: Vec<DeviceCall>,
    pub now_ms: u64,
}

#[allow(dead_code)]
impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms,
            ..Self::default()
        }
    }

    pub fn restarts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == DeviceCall::Restart)
            .count()
    }
}

impl DevicePort for MockDevice {
    fn stop_animation(&mut self) {
        self.calls.push(DeviceCall::StopAnimation);
    }

    fn set_status_indicator(&mut self, status: LedStatus) {
        self.calls.push(DeviceCall::SetIndicator(status));
    }

    fn update_status_indicator(&mut self) {
        self.calls.push(DeviceCall::UpdateIndicator);
    }

    fn restart(&mut self) {
        self.calls.push(DeviceCall::Restart);
    }
}

impl TimePort for MockDevice {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }
}

// ── Firmware source ───────────────────────────────────────────

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
    /// Fail the read that would start at this offset.
    pub fail_at: Option<(usize, SourceError)>,
}

#[allow(dead_code)]
impl MockResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
            fail_at: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_length: Some(9),
            body: b"Not Found".to_vec(),
            fail_at: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockSource {
    pub responses: VecDeque<Result<MockResponse, SourceError>>,
    pub opened: Vec<String>,
}

#[allow(dead_code)]
impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(response: Result<MockResponse, SourceError>) -> Self {
        let mut s = Self::new();
        s.responses.push_back(response);
        s
    }
}

impl FirmwareSource for MockSource {
    type Body = MockBody;

    fn open(&mut self, url: &str) -> Result<SourceResponse<MockBody>, SourceError> {
        self.opened.push(url.to_owned());
        let resp = self.responses.pop_front().unwrap_or(Err(SourceError::Init))?;
        Ok(SourceResponse {
            status: resp.status,
            content_length: resp.content_length,
            body: MockBody {
                data: resp.body,
                pos: 0,
                fail_at: resp.fail_at,
            },
        })
    }
}

#[derive(Debug)]
pub struct MockBody {
    data: Vec<u8>,
    pos: usize,
    fail_at: Option<(usize, SourceError)>,
}

impl BodyReader for MockBody {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        if let Some((at, err)) = self.fail_at {
            if self.pos >= at {
                return Err(err);
            }
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<UpdateEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UpdateEvent::Failed(msg) => Some(msg.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                UpdateEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &UpdateEvent) {
        self.events.push(event.clone());
    }
}
