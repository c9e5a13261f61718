//! Fuzz target: `UpdateService` driven by arbitrary upload and cancel ops
//!
//! Each input byte is an opcode.  Whatever the order, the pipeline must
//! never panic, never commit an image that failed its checks, and never
//! report more than 100 % progress.
//!
//! cargo fuzz run fuzz_upload_session

#![no_main]

use clockclock::app::events::UpdateEvent;
use clockclock::app::ports::{
    BodyReader, DevicePort, EventSink, FirmwareSource, FlashSink, SourceResponse, TimePort,
};
use clockclock::config::UpdateConfig;
use clockclock::drivers::led_patterns::LedStatus;
use clockclock::error::{FlashError, SourceError};
use clockclock::ota::session::IMAGE_MAGIC;
use clockclock::ota::upload::{UploadEvent, UploadRequest};
use clockclock::ota::{UpdateService, UpdateStatus};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Flash {
    open: bool,
    written: usize,
    committed: Option<usize>,
}

impl FlashSink for Flash {
    fn begin(&mut self, _size_hint: Option<u32>) -> Result<(), FlashError> {
        self.open = true;
        self.written = 0;
        Ok(())
    }
    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        assert!(self.open, "write to closed sink");
        self.written += data.len();
        Ok(())
    }
    fn end(&mut self) -> Result<(), FlashError> {
        assert!(self.open, "commit of closed sink");
        self.open = false;
        self.committed = Some(self.written);
        Ok(())
    }
    fn abort(&mut self) {
        self.open = false;
    }
}

struct NoSource;
struct NoBody;

impl BodyReader for NoBody {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, SourceError> {
        Ok(0)
    }
}

impl FirmwareSource for NoSource {
    type Body = NoBody;
    fn open(&mut self, _url: &str) -> Result<SourceResponse<NoBody>, SourceError> {
        Err(SourceError::Init)
    }
}

#[derive(Default)]
struct Hw {
    now: u64,
}

impl DevicePort for Hw {
    fn stop_animation(&mut self) {}
    fn set_status_indicator(&mut self, _status: LedStatus) {}
    fn update_status_indicator(&mut self) {}
    fn restart(&mut self) {}
}

impl TimePort for Hw {
    fn uptime_ms(&self) -> u64 {
        self.now
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &UpdateEvent) {}
}

fuzz_target!(|ops: &[u8]| {
    let mut svc = UpdateService::new(Flash::default(), NoSource, &UpdateConfig::default());
    let mut hw = Hw::default();
    let mut sink = Discard;
    let mut req = UploadRequest::new();
    let mut sent: u32 = 0;

    for &op in ops {
        hw.now += 7;
        match op % 6 {
            0 => {
                req = UploadRequest::new();
                sent = 0;
                let total = u32::from(op >> 3) * 16;
                let total_size = (total > 0).then_some(total);
                svc.handle_upload(&mut req, UploadEvent::Start { filename: None, total_size }, &mut hw, &mut sink);
            }
            1 | 2 => {
                let mut chunk = vec![op; usize::from(op >> 3) + 1];
                if sent == 0 && op & 0x40 != 0 {
                    chunk[0] = IMAGE_MAGIC;
                }
                sent += chunk.len() as u32;
                svc.handle_upload(&mut req, UploadEvent::Data(&chunk), &mut hw, &mut sink);
            }
            3 => svc.handle_upload(&mut req, UploadEvent::End { total_size: sent }, &mut hw, &mut sink),
            4 => {
                svc.cancel(&mut sink);
            }
            _ => {
                hw.now += 5_000;
                svc.tick(&mut hw, &mut sink);
            }
        }

        let snap = svc.snapshot(hw.now);
        assert!(snap.progress <= 100);
        if let Some(n) = svc.session().flash().committed {
            if svc.session().status() == UpdateStatus::Success {
                assert_eq!(n as u32, svc.session().total_size());
            }
        }
    }
});
