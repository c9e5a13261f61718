//! HTTP API for the update pipeline.
//!
//! Handlers here are transport-free: they take request bytes and return an
//! [`ApiResponse`].  The ESP-IDF server adapter only moves bytes between
//! the socket and these functions, so every route is testable on the host.
//!
//! | Method | Path                  | Handler                       |
//! |--------|-----------------------|-------------------------------|
//! | POST   | `/api/update/upload`  | [`UpdateApi::upload_event`]   |
//! | GET    | `/api/update/status`  | [`UpdateApi::status`]         |
//! | POST   | `/api/update/fetch`   | [`UpdateApi::fetch`]          |
//! | POST   | `/api/update/cancel`  | [`UpdateApi::cancel`]         |
//! | GET    | `/api/update/target`  | [`UpdateApi::target`]         |

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{DevicePort, EventSink, FirmwareSource, FlashSink, TimePort};
use crate::board;
use crate::error::UpdateError;
use crate::ota::fetch::{FetchStep, parse_url};
use crate::ota::service::UpdateService;
use crate::ota::upload::{UploadEvent, UploadRequest};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

// ── Route table ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Upload,
    Status,
    Fetch,
    Cancel,
    Target,
}

pub const ROUTES: [(Method, &str, Route); 5] = [
    (Method::Post, "/api/update/upload", Route::Upload),
    (Method::Get, "/api/update/status", Route::Status),
    (Method::Post, "/api/update/fetch", Route::Fetch),
    (Method::Post, "/api/update/cancel", Route::Cancel),
    (Method::Get, "/api/update/target", Route::Target),
];

/// Look a request up in [`ROUTES`].
pub fn route(method: Method, path: &str) -> Option<Route> {
    let path = path.split('?').next().unwrap_or(path);
    ROUTES
        .iter()
        .find(|(m, p, _)| *m == method && *p == path)
        .map(|&(_, _, r)| r)
}

// ── Bodies ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl ApiResponse {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_JSON,
            body,
        }
    }

    fn ack(status: u16, ack: &Ack<'_>) -> Self {
        Self::json(status, serde_json::to_string(ack).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct FetchRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
struct Ack<'a> {
    status: &'a str,
    message: &'a str,
}

fn error_ack(status: u16, message: &str) -> ApiResponse {
    ApiResponse::ack(
        status,
        &Ack {
            status: "error",
            message,
        },
    )
}

// ── Handlers ──────────────────────────────────────────────────

/// Route handlers bound to the service and the ports it needs.
///
/// The ESP-IDF build keeps one of these behind `Arc<Mutex<_>>`; the server
/// task and the main loop each lock it per operation.
pub struct UpdateApi<F: FlashSink, S: FirmwareSource, H, E> {
    service: UpdateService<F, S>,
    hw: H,
    sink: E,
}

impl<F, S, H, E> UpdateApi<F, S, H, E>
where
    F: FlashSink,
    S: FirmwareSource,
    H: DevicePort + TimePort,
    E: EventSink,
{
    pub fn new(service: UpdateService<F, S>, hw: H, sink: E) -> Self {
        Self { service, hw, sink }
    }

    /// `GET /api/update/status`
    pub fn status(&self) -> ApiResponse {
        ApiResponse::json(200, self.service.snapshot(self.hw.uptime_ms()).to_json())
    }

    /// `POST /api/update/fetch`
    pub fn fetch(&mut self, body: &[u8]) -> ApiResponse {
        let Ok(req) = serde_json::from_slice::<FetchRequest>(body) else {
            return error_ack(400, "Invalid JSON");
        };
        let url = match parse_url(&req.url) {
            Ok(url) => url,
            Err(e) => {
                warn!("API: fetch rejected: {}", e);
                return error_ack(400, &e.to_string());
            }
        };
        match self.service.request_fetch(url, &self.hw, &mut self.sink) {
            Ok(()) => ApiResponse::ack(
                200,
                &Ack {
                    status: "started",
                    message: "Firmware download started",
                },
            ),
            Err(e) => error_ack(409, &e.to_string()),
        }
    }

    /// `POST /api/update/cancel`
    pub fn cancel(&mut self) -> ApiResponse {
        let cancelled = self.service.cancel(&mut self.sink);
        debug!("API: cancel (active={})", cancelled);
        ApiResponse::ack(
            200,
            &Ack {
                status: "cancelled",
                message: "Update cancelled",
            },
        )
    }

    /// `GET /api/update/target`
    pub fn target(&self) -> ApiResponse {
        ApiResponse {
            status: 200,
            content_type: CONTENT_TYPE_TEXT,
            body: board::BOARD_TARGET.to_owned(),
        }
    }

    // ── POST /api/update/upload ───────────────────────────────

    /// Apply one decoded upload event for `request`.
    pub fn upload_event(&mut self, request: &mut UploadRequest, event: UploadEvent<'_>) {
        self.service
            .handle_upload(request, event, &mut self.hw, &mut self.sink);
    }

    /// The upload body could not be decoded.
    pub fn upload_rejected(&mut self, request: &mut UploadRequest, err: UpdateError) {
        self.service.reject_upload(request, err, &mut self.sink);
    }

    /// Final response for an upload request: status snapshot, 200 or 400.
    pub fn upload_response(&self, request: &UploadRequest) -> ApiResponse {
        ApiResponse::json(
            request.response_code(),
            self.service.snapshot(self.hw.uptime_ms()).to_json(),
        )
    }

    // ── Main loop ─────────────────────────────────────────────

    /// One fetch step.
    pub fn poll(&mut self) -> FetchStep {
        self.service.poll(&mut self.hw, &mut self.sink)
    }

    /// Reboot check.
    pub fn tick(&mut self) -> bool {
        self.service.tick(&mut self.hw, &mut self.sink)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn service(&self) -> &UpdateService<F, S> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut UpdateService<F, S> {
        &mut self.service
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }
}
