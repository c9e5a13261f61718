//! Outbound HTTP(S) firmware source on the ESP-IDF HTTP client.
//!
//! Redirects are always followed (release assets sit behind 302s).  No CA
//! bundle is attached and `CONFIG_ESP_TLS_SKIP_SERVER_CERT_VERIFY` is set,
//! so the server certificate is NOT verified: any host reachable from the
//! clock's network can serve an image.  The image magic check is the only
//! content validation.

use std::time::{Duration, Instant};

use esp_idf_svc::http::client::{Configuration, EspHttpConnection, FollowRedirectsPolicy};
use esp_idf_svc::http::{Headers, Method, Status};
use esp_idf_svc::io::Read;
use log::{info, warn};

use crate::app::ports::{BodyReader, FirmwareSource, SourceResponse};
use crate::config::UpdateConfig;
use crate::error::SourceError;

pub struct EspFirmwareSource {
    buffer_size: usize,
    timeout: Duration,
}

impl EspFirmwareSource {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            buffer_size: config.fetch_buffer_size,
            timeout: Duration::from_millis(config.fetch_timeout_ms as u64),
        }
    }
}

impl FirmwareSource for EspFirmwareSource {
    type Body = EspFirmwareBody;

    fn open(&mut self, url: &str) -> Result<SourceResponse<Self::Body>, SourceError> {
        let mut conn = EspHttpConnection::new(&Configuration {
            buffer_size: Some(self.buffer_size),
            buffer_size_tx: Some(1024),
            timeout: Some(self.timeout),
            follow_redirects_policy: FollowRedirectsPolicy::FollowAll,
            ..Default::default()
        })
        .map_err(|e| {
            warn!("http: client init failed: {:?}", e);
            SourceError::Init
        })?;

        conn.initiate_request(Method::Get, url, &[("Accept", "application/octet-stream")])
            .map_err(|e| {
                warn!("http: request to {} failed: {:?}", url, e);
                SourceError::Init
            })?;
        conn.initiate_response().map_err(|e| {
            warn!("http: no response from {}: {:?}", url, e);
            SourceError::Io
        })?;

        let status = conn.status();
        let content_length = conn.content_len();
        info!("http: GET {} -> {} ({:?} bytes)", url, status, content_length);

        Ok(SourceResponse {
            status,
            content_length,
            body: EspFirmwareBody {
                conn,
                timeout: self.timeout,
            },
        })
    }
}

pub struct EspFirmwareBody {
    conn: EspHttpConnection,
    timeout: Duration,
}

impl BodyReader for EspFirmwareBody {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let started = Instant::now();
        self.conn.read(buf).map_err(|e| {
            if started.elapsed() >= self.timeout {
                warn!("http: body read timed out after {:?}", self.timeout);
                SourceError::Timeout
            } else {
                warn!("http: body read failed: {:?}", e);
                SourceError::Io
            }
        })
    }
}
