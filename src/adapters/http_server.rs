//! ESP-IDF HTTP server binding for the update API.
//!
//! Registers every entry of [`ROUTES`] on an [`EspHttpServer`].  Handlers
//! run one at a time on the single httpd task and lock the shared
//! [`UpdateApi`] per operation.  Uploads lock once per received chunk, so
//! the main loop (fetch steps, reboot check, LED) keeps running while an
//! image streams in.  A status request sent during an upload is queued by
//! httpd and answered once the upload handler returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::{self, Headers};
use esp_idf_svc::io::{Read, Write};
use log::{info, warn};

use crate::api::{ApiResponse, Method, ROUTES, Route, UpdateApi};
use crate::app::ports::{DevicePort, EventSink, FirmwareSource, FlashSink, TimePort};
use crate::config::UpdateConfig;
use crate::ota::upload::{UploadDecoder, UploadEvent, UploadRequest};

/// Upload read size; lives on the httpd stack.
const UPLOAD_CHUNK: usize = 1024;
/// Largest JSON body accepted by the fetch route.
const MAX_JSON_BODY: usize = 1024;

pub type SharedApi<F, S, H, E> = Arc<Mutex<UpdateApi<F, S, H, E>>>;

pub fn start<F, S, H, E>(
    api: &SharedApi<F, S, H, E>,
    config: &UpdateConfig,
) -> Result<EspHttpServer<'static>>
where
    F: FlashSink + Send + 'static,
    S: FirmwareSource + Send + 'static,
    S::Body: Send,
    H: DevicePort + TimePort + Send + 'static,
    E: EventSink + Send + 'static,
{
    let mut server = EspHttpServer::new(&Configuration {
        stack_size: config.http_stack_size,
        ..Default::default()
    })?;

    for (method, path, route) in ROUTES {
        let api = Arc::clone(api);
        let method = match method {
            Method::Get => http::Method::Get,
            Method::Post => http::Method::Post,
        };
        server.fn_handler(path, method, move |req| handle(route, req, &api))?;
    }

    info!("http: update API listening ({} routes)", ROUTES.len());
    Ok(server)
}

fn handle<F, S, H, E>(
    route: Route,
    mut req: Request<&mut EspHttpConnection<'_>>,
    api: &Mutex<UpdateApi<F, S, H, E>>,
) -> Result<()>
where
    F: FlashSink,
    S: FirmwareSource,
    H: DevicePort + TimePort,
    E: EventSink,
{
    let resp = match route {
        Route::Status => lock(api).status(),
        Route::Target => lock(api).target(),
        Route::Cancel => lock(api).cancel(),
        Route::Fetch => {
            let body = read_small_body(&mut req)?;
            lock(api).fetch(&body)
        }
        Route::Upload => upload(&mut req, api),
    };
    respond(req, &resp)
}

fn upload<F, S, H, E>(
    req: &mut Request<&mut EspHttpConnection<'_>>,
    api: &Mutex<UpdateApi<F, S, H, E>>,
) -> ApiResponse
where
    F: FlashSink,
    S: FirmwareSource,
    H: DevicePort + TimePort,
    E: EventSink,
{
    let content_type = req.header("Content-Type").map(str::to_owned);
    let content_length = req.content_len();
    let mut request = UploadRequest::new();

    let mut decoder = match UploadDecoder::from_headers(content_type.as_deref(), content_length) {
        Ok(decoder) => Some(decoder),
        Err(e) => {
            lock(api).upload_rejected(&mut request, e);
            None
        }
    };

    let mut buf = [0u8; UPLOAD_CHUNK];
    loop {
        let n = match req.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("http: upload connection lost: {:?}", e);
                lock(api).upload_event(&mut request, UploadEvent::Aborted);
                break;
            }
        };
        // After a decode error the rest of the body is drained unread.
        let Some(dec) = decoder.as_mut() else {
            if n == 0 {
                break;
            }
            continue;
        };

        let mut guard = lock(api);
        let res = if n == 0 {
            dec.finish(|ev| guard.upload_event(&mut request, ev))
        } else {
            dec.feed(&buf[..n], |ev| guard.upload_event(&mut request, ev))
        };
        if let Err(e) = res {
            guard.upload_rejected(&mut request, e);
            decoder = None;
        }
        if n == 0 {
            break;
        }
    }

    lock(api).upload_response(&request)
}

fn read_small_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = req.read(&mut buf)?;
        if n == 0 || body.len() + n > MAX_JSON_BODY {
            // Oversized bodies are truncated and then fail JSON parsing.
            body.extend_from_slice(&buf[..n.min(MAX_JSON_BODY.saturating_sub(body.len()))]);
            return Ok(body);
        }
        body.extend_from_slice(&buf[..n]);
    }
}

fn respond(req: Request<&mut EspHttpConnection<'_>>, resp: &ApiResponse) -> Result<()> {
    let mut out = req.into_response(
        resp.status,
        None,
        &[
            ("Content-Type", resp.content_type),
            ("Cache-Control", "no-cache"),
        ],
    )?;
    out.write_all(resp.body.as_bytes())?;
    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
