//! HTTP route handlers driven through `UpdateApi` with mock ports.

use clockclock::api::{
    CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, Method, ROUTES, Route, UpdateApi, route,
};
use clockclock::board;
use clockclock::config::UpdateConfig;
use clockclock::error::UpdateError;
use clockclock::ota::fetch::FetchStep;
use clockclock::ota::upload::{UploadDecoder, UploadRequest};
use clockclock::ota::{UpdateService, UpdateStatus};

use super::mock_ports::{MockDevice, MockFlash, MockResponse, MockSource, RecordingSink, image};

type Api = UpdateApi<MockFlash, MockSource, MockDevice, RecordingSink>;

const FETCH_BODY: &[u8] = br#"{"url":"https://example.com/fw/lolin_s3_mini.bin"}"#;

fn api_with(source: MockSource) -> Api {
    let service = UpdateService::new(MockFlash::new(), source, &UpdateConfig::default());
    UpdateApi::new(service, MockDevice::at(5_000), RecordingSink::new())
}

fn api() -> Api {
    api_with(MockSource::new())
}

/// Push a whole request body through the decoder in `chunk`-sized reads,
/// the way the server adapter does.
fn post_upload(api: &mut Api, content_type: &str, body: &[u8], chunk: usize) -> UploadRequest {
    let mut req = UploadRequest::new();
    let mut decoder =
        match UploadDecoder::from_headers(Some(content_type), Some(body.len() as u64)) {
            Ok(d) => d,
            Err(e) => {
                api.upload_rejected(&mut req, e);
                return req;
            }
        };
    for piece in body.chunks(chunk) {
        if let Err(e) = decoder.feed(piece, |ev| api.upload_event(&mut req, ev)) {
            api.upload_rejected(&mut req, e);
            return req;
        }
    }
    if let Err(e) = decoder.finish(|ev| api.upload_event(&mut req, ev)) {
        api.upload_rejected(&mut req, e);
    }
    req
}

#[test]
fn route_table_covers_every_endpoint() {
    for (method, path, expected) in ROUTES {
        assert_eq!(route(method, path), Some(expected));
    }
    assert_eq!(route(Method::Post, "/api/update/status"), None);
    assert_eq!(route(Method::Get, "/api/update/target?board=1"), Some(Route::Target));
}

#[test]
fn idle_status_has_every_field() {
    let resp = api().status();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, CONTENT_TYPE_JSON);
    assert_eq!(
        resp.body,
        r#"{"in_progress":false,"status":"idle","progress":0,"current":0,"total":0,"error":"","elapsed":0}"#
    );
}

#[test]
fn target_reports_board_asset_name() {
    let resp = api().target();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, CONTENT_TYPE_TEXT);
    assert_eq!(resp.body, board::BOARD_TARGET);
}

#[test]
fn fetch_rejects_bad_bodies() {
    let mut api = api();

    let resp = api.fetch(b"not json");
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body, r#"{"status":"error","message":"Invalid JSON"}"#);

    let resp = api.fetch(b"{}");
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body, r#"{"status":"error","message":"URL is required"}"#);

    let resp = api.fetch(br#"{"url":"ftp://example.com/fw.bin"}"#);
    assert_eq!(resp.status, 400);
    assert_eq!(
        resp.body,
        r#"{"status":"error","message":"Unsupported URL scheme"}"#
    );

    assert!(!api.service().fetch_pending());
}

#[test]
fn fetch_accepted_then_busy() {
    let mut api = api_with(MockSource::with(Ok(MockResponse::ok(image(256)))));

    let resp = api.fetch(FETCH_BODY);
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        r#"{"status":"started","message":"Firmware download started"}"#
    );

    let resp = api.fetch(FETCH_BODY);
    assert_eq!(resp.status, 409);
    assert_eq!(
        resp.body,
        r#"{"status":"error","message":"Update already in progress"}"#
    );
}

#[test]
fn fetch_runs_from_main_loop_and_reboots() {
    let mut api = api_with(MockSource::with(Ok(MockResponse::ok(image(1000)))));
    assert_eq!(api.fetch(FETCH_BODY).status, 200);

    // The handler reserves the session; the connection opens on the first poll.
    let body = api.status().body;
    assert!(body.contains(r#""in_progress":true"#));
    assert!(body.contains(r#""status":"starting""#));
    assert!(api.service().source().opened.is_empty());

    assert_eq!(api.poll(), FetchStep::Opened { total_size: 1000 });
    assert!(api.status().body.contains(r#""status":"fetching""#));
    while !matches!(api.poll(), FetchStep::Finished) {
        api.hw_mut().now_ms += 10;
    }
    assert_eq!(api.service().session().status(), UpdateStatus::Success);
    assert!(api.status().body.contains(r#""progress":100"#));

    assert!(!api.tick());
    api.hw_mut().now_ms += u64::from(UpdateConfig::default().reboot_delay_ms);
    assert!(api.tick());
    assert_eq!(api.hw().restarts(), 1);
}

#[test]
fn cancel_always_acknowledges() {
    let mut api = api();
    let resp = api.cancel();
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body,
        r#"{"status":"cancelled","message":"Update cancelled"}"#
    );
    // Nothing was running, so the session is untouched.
    assert_eq!(api.service().session().status(), UpdateStatus::Idle);
}

#[test]
fn cancel_stops_a_queued_fetch() {
    let mut api = api_with(MockSource::with(Ok(MockResponse::ok(image(256)))));
    assert_eq!(api.fetch(FETCH_BODY).status, 200);
    assert_eq!(api.cancel().status, 200);

    let body = api.status().body;
    assert!(body.contains(r#""in_progress":false"#));
    assert!(body.contains(r#""status":"cancelled""#));
    assert!(body.contains(r#""error":"Update cancelled by user""#));

    assert_eq!(api.poll(), FetchStep::Idle);
    assert!(api.service().source().opened.is_empty());
    assert_eq!(api.fetch(FETCH_BODY).status, 200);
}

#[test]
fn upload_between_fetch_ack_and_first_poll_is_refused() {
    let img = image(1000);
    let mut api = api_with(MockSource::with(Ok(MockResponse::ok(img.clone()))));
    assert_eq!(api.fetch(FETCH_BODY).status, 200);

    let req = post_upload(&mut api, "application/octet-stream", &image(300), 300);
    assert_eq!(req.failed(), Some(UpdateError::SessionBusy));
    assert_eq!(api.upload_response(&req).status, 400);
    assert!(api.service().session().flash().untouched());

    // The acknowledged fetch owns the session and its outcome is visible.
    assert_eq!(api.poll(), FetchStep::Opened { total_size: 1000 });
    while !matches!(api.poll(), FetchStep::Finished) {}
    assert!(api.status().body.contains(r#""status":"success""#));
    assert_eq!(
        api.service().session().flash().committed.as_deref(),
        Some(&img[..])
    );
}

#[test]
fn main_loop_runs_between_upload_chunks() {
    let mut api = api();
    let img = image(2048);
    let mut req = UploadRequest::new();
    let mut decoder =
        UploadDecoder::from_headers(Some("application/octet-stream"), Some(2048)).unwrap();

    for piece in img.chunks(512) {
        decoder.feed(piece, |ev| api.upload_event(&mut req, ev)).unwrap();
        // Each chunk releases the API, so loop work and status reads interleave.
        assert_eq!(api.poll(), FetchStep::Idle);
        assert!(!api.tick());
        assert!(api.status().body.contains(r#""in_progress":true"#));
        api.hw_mut().now_ms += 50;
    }
    decoder.finish(|ev| api.upload_event(&mut req, ev)).unwrap();

    assert_eq!(api.upload_response(&req).status, 200);
    assert!(api.status().body.contains(r#""status":"success""#));
}

#[test]
fn raw_upload_returns_success_snapshot() {
    let mut api = api();
    let img = image(3000);

    let req = post_upload(&mut api, "application/octet-stream", &img, 1024);
    let resp = api.upload_response(&req);

    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, CONTENT_TYPE_JSON);
    assert_eq!(
        resp.body,
        r#"{"in_progress":false,"status":"success","progress":100,"current":3000,"total":3000,"error":"","elapsed":0}"#
    );
    assert_eq!(
        api.service().session().flash().committed.as_deref(),
        Some(&img[..])
    );
}

#[test]
fn multipart_upload_with_extra_fields() {
    let mut api = api();
    let img = image(1500);
    let mut body = Vec::new();
    body.extend_from_slice(
        b"--XyZ\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nnightly\r\n",
    );
    body.extend_from_slice(
        b"--XyZ\r\nContent-Disposition: form-data; name=\"update\"; filename=\"fw.bin\"\r\n\
          Content-Type: application/octet-stream\r\n\r\n",
    );
    body.extend_from_slice(&img);
    body.extend_from_slice(b"\r\n--XyZ--\r\n");

    let req = post_upload(&mut api, "multipart/form-data; boundary=XyZ", &body, 333);

    assert_eq!(req.failed(), None);
    assert_eq!(api.upload_response(&req).status, 200);
    assert_eq!(
        api.service().session().flash().committed.as_deref(),
        Some(&img[..])
    );
}

#[test]
fn bad_image_upload_returns_400_with_error() {
    let mut api = api();
    let mut img = image(512);
    img[0] = 0x00;

    let req = post_upload(&mut api, "application/octet-stream", &img, 128);
    let resp = api.upload_response(&req);

    assert_eq!(resp.status, 400);
    assert!(resp.body.contains(r#""status":"error""#));
    assert!(resp.body.contains(r#""error":"Invalid firmware signature""#));
}

#[test]
fn empty_upload_is_rejected_without_a_session() {
    let mut api = api();

    let req = post_upload(&mut api, "application/octet-stream", &[], 64);

    assert_eq!(req.failed(), Some(UpdateError::EmptyUpload));
    assert_eq!(api.upload_response(&req).status, 400);
    assert_eq!(api.service().session().status(), UpdateStatus::Idle);
    assert!(api.service().session().flash().untouched());
}

#[test]
fn multipart_without_boundary_is_malformed() {
    let mut api = api();

    let req = post_upload(&mut api, "multipart/form-data", &image(64), 64);

    assert_eq!(req.failed(), Some(UpdateError::MalformedUpload));
    assert_eq!(api.upload_response(&req).status, 400);
}

#[test]
fn upload_while_fetch_running_is_rejected() {
    let mut api = api_with(MockSource::with(Ok(MockResponse::ok(image(4096)))));
    assert_eq!(api.fetch(FETCH_BODY).status, 200);
    assert!(matches!(api.poll(), FetchStep::Opened { .. }));

    let req = post_upload(&mut api, "application/octet-stream", &image(256), 256);

    assert_eq!(req.failed(), Some(UpdateError::SessionBusy));
    assert_eq!(api.upload_response(&req).status, 400);
    // The fetch carries on untouched.
    assert_eq!(api.service().session().status(), UpdateStatus::Fetching);
    assert_eq!(api.poll(), FetchStep::Chunk(512));
}
