//! Direct upload: upload events → session → flash, end to end.

use clockclock::app::events::UpdateEvent;
use clockclock::config::UpdateConfig;
use clockclock::drivers::led_patterns::LedStatus;
use clockclock::error::UpdateError;
use clockclock::ota::upload::{UploadDecoder, UploadEvent, UploadRequest};
use clockclock::ota::{UpdateService, UpdateStatus};

use super::mock_ports::{DeviceCall, MockDevice, MockFlash, MockSource, RecordingSink, image};

type Service = UpdateService<MockFlash, MockSource>;

fn service() -> Service {
    UpdateService::new(MockFlash::new(), MockSource::new(), &UpdateConfig::default())
}

fn upload(
    svc: &mut Service,
    req: &mut UploadRequest,
    data: &[u8],
    declared: Option<u32>,
    chunk: usize,
    hw: &mut MockDevice,
    sink: &mut RecordingSink,
) {
    svc.handle_upload(
        req,
        UploadEvent::Start {
            filename: Some("firmware.bin"),
            total_size: declared,
        },
        hw,
        sink,
    );
    for piece in data.chunks(chunk) {
        svc.handle_upload(req, UploadEvent::Data(piece), hw, sink);
    }
    svc.handle_upload(
        req,
        UploadEvent::End {
            total_size: data.len() as u32,
        },
        hw,
        sink,
    );
}

#[test]
fn successful_upload_reports_success_and_reboots_later() {
    let mut svc = service();
    let mut hw = MockDevice::at(10_000);
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let img = image(1024);
    upload(&mut svc, &mut req, &img, Some(1024), 256, &mut hw, &mut sink);

    assert_eq!(req.response_code(), 200);
    assert_eq!(
        svc.snapshot(hw.now_ms).to_json(),
        r#"{"in_progress":false,"status":"success","progress":100,"current":1024,"total":1024,"error":"","elapsed":0}"#
    );
    assert_eq!(svc.session().flash().committed.as_deref(), Some(&img[..]));

    hw.now_ms = 12_999;
    assert!(!svc.tick(&mut hw, &mut sink));
    hw.now_ms = 13_000;
    assert!(svc.tick(&mut hw, &mut sink));
    hw.now_ms = 20_000;
    assert!(!svc.tick(&mut hw, &mut sink));
    assert_eq!(hw.restarts(), 1);
    assert_eq!(sink.events.last(), Some(&UpdateEvent::Rebooting));
}

#[test]
fn device_is_quiesced_before_first_write() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    upload(&mut svc, &mut req, &image(300), Some(300), 100, &mut hw, &mut sink);

    assert_eq!(
        &hw.calls[..5],
        &[
            DeviceCall::StopAnimation,
            DeviceCall::SetIndicator(LedStatus::Update),
            DeviceCall::UpdateIndicator,
            DeviceCall::UpdateIndicator,
            DeviceCall::UpdateIndicator,
        ]
    );
    assert_eq!(svc.session().flash().last_hint, Some(Some(300)));
}

#[test]
fn bad_signature_fails_after_first_chunk() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let mut data = vec![0u8; 1024];
    data[1] = 0xE9;
    upload(&mut svc, &mut req, &data, Some(1024), 128, &mut hw, &mut sink);

    assert_eq!(req.response_code(), 400);
    assert_eq!(req.failed(), Some(UpdateError::InvalidSignature));
    let snap = svc.snapshot(hw.now_ms);
    assert_eq!(snap.status, UpdateStatus::Error);
    assert_eq!(snap.error.as_str(), "Invalid firmware signature");
    assert_eq!(snap.bytes_written, 0);
    assert!(!snap.in_progress);

    let flash = svc.session().flash();
    assert!(flash.data.is_empty());
    assert_eq!(flash.aborts, 1);
    assert!(flash.committed.is_none());
    assert_eq!(sink.failures(), vec!["Invalid firmware signature".to_owned()]);
}

#[test]
fn writes_after_error_are_rejected_until_restart() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();

    svc.start(64, clockclock::ota::Ingestion::Upload, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        svc.write_chunk(&[0x00; 32], &mut hw, &mut sink),
        Err(UpdateError::InvalidSignature)
    );
    assert_eq!(
        svc.write_chunk(&image(32), &mut hw, &mut sink),
        Err(UpdateError::NotReceiving)
    );
    assert_eq!(svc.session().bytes_written(), 0);

    svc.start(64, clockclock::ota::Ingestion::Upload, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(svc.write_chunk(&image(32), &mut hw, &mut sink), Ok(32));
}

#[test]
fn short_upload_is_size_mismatch() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let img = image(1000);
    svc.handle_upload(
        &mut req,
        UploadEvent::Start {
            filename: None,
            total_size: Some(1024),
        },
        &mut hw,
        &mut sink,
    );
    svc.handle_upload(&mut req, UploadEvent::Data(&img), &mut hw, &mut sink);
    svc.handle_upload(
        &mut req,
        UploadEvent::End { total_size: 1000 },
        &mut hw,
        &mut sink,
    );

    assert_eq!(req.response_code(), 400);
    let snap = svc.snapshot(0);
    assert_eq!(snap.error.as_str(), "Upload size mismatch");
    assert_eq!(svc.session().flash().aborts, 1);
    assert_eq!(svc.session().reboot_at(), None);
}

#[test]
fn unknown_size_upload_takes_total_from_end_event() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let img = image(777);
    upload(&mut svc, &mut req, &img, None, 100, &mut hw, &mut sink);

    assert_eq!(req.response_code(), 200);
    assert_eq!(svc.session().status(), UpdateStatus::Success);
    assert_eq!(svc.session().total_size(), 777);
    assert_eq!(svc.session().flash().last_hint, Some(None));
}

#[test]
fn aborted_upload_is_cancelled_and_never_reboots() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let img = image(512);
    svc.handle_upload(
        &mut req,
        UploadEvent::Start {
            filename: Some("fw.bin"),
            total_size: Some(1024),
        },
        &mut hw,
        &mut sink,
    );
    svc.handle_upload(&mut req, UploadEvent::Data(&img), &mut hw, &mut sink);
    svc.handle_upload(&mut req, UploadEvent::Aborted, &mut hw, &mut sink);

    let snap = svc.snapshot(0);
    assert_eq!(snap.status, UpdateStatus::Cancelled);
    assert_eq!(snap.error.as_str(), "Update cancelled by user");
    assert_eq!(svc.session().flash().aborts, 1);

    hw.now_ms = u64::MAX / 2;
    assert!(!svc.tick(&mut hw, &mut sink));
    assert_eq!(hw.restarts(), 0);
}

#[test]
fn second_upload_while_busy_is_rejected() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut first = UploadRequest::new();
    let mut second = UploadRequest::new();

    let img = image(1024);
    svc.handle_upload(
        &mut first,
        UploadEvent::Start {
            filename: None,
            total_size: Some(1024),
        },
        &mut hw,
        &mut sink,
    );
    svc.handle_upload(&mut first, UploadEvent::Data(&img[..512]), &mut hw, &mut sink);

    svc.handle_upload(
        &mut second,
        UploadEvent::Start {
            filename: None,
            total_size: Some(64),
        },
        &mut hw,
        &mut sink,
    );
    svc.handle_upload(&mut second, UploadEvent::Data(&image(64)), &mut hw, &mut sink);
    assert_eq!(second.failed(), Some(UpdateError::SessionBusy));
    assert_eq!(svc.session().bytes_written(), 512);

    svc.handle_upload(&mut first, UploadEvent::Data(&img[512..]), &mut hw, &mut sink);
    svc.handle_upload(
        &mut first,
        UploadEvent::End { total_size: 1024 },
        &mut hw,
        &mut sink,
    );
    assert_eq!(first.response_code(), 200);
    assert_eq!(svc.session().status(), UpdateStatus::Success);
}

#[test]
fn stale_request_cannot_write_into_a_newer_session() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut old = UploadRequest::new();

    svc.handle_upload(
        &mut old,
        UploadEvent::Start {
            filename: None,
            total_size: Some(128),
        },
        &mut hw,
        &mut sink,
    );
    assert!(svc.cancel(&mut sink));

    let mut fresh = UploadRequest::new();
    svc.handle_upload(
        &mut fresh,
        UploadEvent::Start {
            filename: None,
            total_size: Some(128),
        },
        &mut hw,
        &mut sink,
    );
    svc.handle_upload(&mut old, UploadEvent::Data(&image(128)), &mut hw, &mut sink);
    assert_eq!(svc.session().bytes_written(), 0);
}

#[test]
fn progress_events_climb_in_tens_and_stop_at_ninety() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    upload(&mut svc, &mut req, &image(1000), Some(1000), 50, &mut hw, &mut sink);

    assert_eq!(sink.progress(), vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, UpdateEvent::RebootScheduled { reboot_at_ms: 3_000 })));
}

#[test]
fn multipart_body_drives_the_session() {
    let mut svc = service();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    let img = image(2000);
    let mut body = Vec::new();
    body.extend_from_slice(b"------WebKitFormBoundary7MA4\r\n");
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"update\"; filename=\"clock.bin\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(&img);
    body.extend_from_slice(b"\r\n------WebKitFormBoundary7MA4--\r\n");

    let mut decoder = UploadDecoder::from_headers(
        Some("multipart/form-data; boundary=----WebKitFormBoundary7MA4"),
        Some(body.len() as u64),
    )
    .unwrap();

    for piece in body.chunks(333) {
        decoder
            .feed(piece, |ev| svc.handle_upload(&mut req, ev, &mut hw, &mut sink))
            .unwrap();
    }
    decoder
        .finish(|ev| svc.handle_upload(&mut req, ev, &mut hw, &mut sink))
        .unwrap();

    assert_eq!(req.response_code(), 200);
    assert_eq!(svc.session().status(), UpdateStatus::Success);
    assert_eq!(svc.session().flash().committed.as_deref(), Some(&img[..]));
}

#[test]
fn flash_open_failure_fails_request_without_writes() {
    let flash = MockFlash {
        fail_begin: true,
        ..MockFlash::default()
    };
    let mut svc = UpdateService::new(flash, MockSource::new(), &UpdateConfig::default());
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    let mut req = UploadRequest::new();

    upload(&mut svc, &mut req, &image(64), Some(64), 64, &mut hw, &mut sink);

    assert_eq!(req.response_code(), 400);
    let snap = svc.snapshot(0);
    assert_eq!(snap.status, UpdateStatus::Error);
    assert!(snap.error.starts_with("Failed to start update"));
    assert!(svc.session().flash().data.is_empty());
}
