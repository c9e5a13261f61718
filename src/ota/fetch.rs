//! Remote fetch: a cooperative download job stepped from the main loop.
//!
//! The HTTP handler reserves the session and queues a URL.  Each
//! [`FetchJob::step`] does one bounded unit of work: the first opens the
//! connection and the reserved session, every later one moves a single
//! chunk from the response body into the session.  Other loop work runs
//! between steps.

use core::fmt;
use core::mem;

use log::{debug, info, warn};

use crate::app::ports::{BodyReader, DevicePort, FirmwareSource, FlashSink, TimePort};
use crate::error::UpdateError;

use super::session::{Ingestion, UpdateSession, UpdateStatus};

/// Longest URL a fetch request may carry.
pub const MAX_URL_LEN: usize = 256;

pub type FetchUrl = heapless::String<MAX_URL_LEN>;

// ── URL validation ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlError {
    Empty,
    UnsupportedScheme,
    TooLong,
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "URL is required"),
            Self::UnsupportedScheme => write!(f, "Unsupported URL scheme"),
            Self::TooLong => write!(f, "URL too long"),
        }
    }
}

/// Accept only non-empty `http://` / `https://` URLs that fit [`FetchUrl`].
pub fn parse_url(url: &str) -> Result<FetchUrl, UrlError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlError::Empty);
    }
    let lower_prefix = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if !(lower_prefix.starts_with("http://") || lower_prefix.starts_with("https://")) {
        return Err(UrlError::UnsupportedScheme);
    }
    let mut out = FetchUrl::new();
    out.push_str(url).map_err(|_| UrlError::TooLong)?;
    Ok(out)
}

// ── Job ───────────────────────────────────────────────────────

enum FetchState<B> {
    Idle,
    Pending(FetchUrl),
    Streaming(B),
}

/// Outcome of one [`FetchJob::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    /// Nothing queued.
    Idle,
    /// Connection open, session started.
    Opened { total_size: u32 },
    /// One chunk of `n` bytes was written.
    Chunk(usize),
    /// Image committed.
    Finished,
    /// The session was cancelled; the connection was dropped.
    Dropped,
    /// The fetch ended with an error.
    Failed(UpdateError),
}

pub struct FetchJob<B> {
    state: FetchState<B>,
    buf: Vec<u8>,
}

impl<B: BodyReader> FetchJob<B> {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            state: FetchState::Idle,
            buf: vec![0; chunk_size],
        }
    }

    /// `true` while a URL is queued or a body is being streamed.
    pub fn is_busy(&self) -> bool {
        !matches!(self.state, FetchState::Idle)
    }

    /// Queue a download.  The caller checks [`is_busy`](Self::is_busy) and
    /// reserves the session first.
    pub fn queue(&mut self, url: FetchUrl) {
        debug_assert!(!self.is_busy(), "fetch queued over a running job");
        info!("OTA: fetch queued for {}", url);
        self.state = FetchState::Pending(url);
    }

    /// Forget any queued URL and drop an open connection.
    pub fn cancel(&mut self) {
        if self.is_busy() {
            debug!("OTA: fetch job dropped");
        }
        self.state = FetchState::Idle;
    }

    /// Advance the job by one bounded unit of work.
    pub fn step<F, S>(
        &mut self,
        source: &mut S,
        session: &mut UpdateSession<F>,
        hw: &mut (impl DevicePort + TimePort),
    ) -> FetchStep
    where
        F: FlashSink,
        S: FirmwareSource<Body = B>,
    {
        match mem::replace(&mut self.state, FetchState::Idle) {
            FetchState::Idle => FetchStep::Idle,
            FetchState::Pending(url) => self.open(&url, source, session, hw),
            FetchState::Streaming(body) => self.pump(body, session, hw),
        }
    }

    fn open<F, S>(
        &mut self,
        url: &str,
        source: &mut S,
        session: &mut UpdateSession<F>,
        hw: &mut (impl DevicePort + TimePort),
    ) -> FetchStep
    where
        F: FlashSink,
        S: FirmwareSource<Body = B>,
    {
        if session.status() != UpdateStatus::Starting
            || session.ingestion() != Some(Ingestion::Fetch)
        {
            // Cancelled before the connection was opened.
            return FetchStep::Dropped;
        }

        let resp = match source.open(url) {
            Ok(resp) => resp,
            Err(e) => return reject(session, e.into()),
        };
        if !(200..300).contains(&resp.status) {
            return reject(session, UpdateError::HttpStatus(resp.status));
        }
        let total_size = match resp.content_length {
            None | Some(0) => return reject(session, UpdateError::MissingContentLength),
            Some(len) => match u32::try_from(len) {
                Ok(len) => len,
                Err(_) => return reject(session, UpdateError::ImageTooLarge),
            },
        };

        if let Err(e) = session.open(total_size, hw) {
            return FetchStep::Failed(e);
        }
        self.state = FetchState::Streaming(resp.body);
        FetchStep::Opened { total_size }
    }

    fn pump<F: FlashSink>(
        &mut self,
        mut body: B,
        session: &mut UpdateSession<F>,
        hw: &mut (impl DevicePort + TimePort),
    ) -> FetchStep {
        if session.status() != UpdateStatus::Fetching {
            // Cancelled (or failed) from another task since the last step.
            return FetchStep::Dropped;
        }

        let n = match body.read(&mut self.buf) {
            Ok(n) => n,
            Err(e) => return FetchStep::Failed(session.fail(e.into())),
        };
        if n == 0 {
            // EOF before the declared size fails the size check.
            return finish(session, hw.uptime_ms());
        }

        match session.write_chunk(&self.buf[..n], hw) {
            Err(e) => FetchStep::Failed(e),
            Ok(_) if session.status() == UpdateStatus::Finishing => finish(session, hw.uptime_ms()),
            Ok(_) => {
                self.state = FetchState::Streaming(body);
                FetchStep::Chunk(n)
            }
        }
    }
}

/// Fail the reserved session before any flash write; the sink stays closed.
fn reject<F: FlashSink>(session: &mut UpdateSession<F>, err: UpdateError) -> FetchStep {
    warn!("OTA: fetch rejected: {}", err);
    FetchStep::Failed(session.fail(err))
}

fn finish<F: FlashSink>(session: &mut UpdateSession<F>, now_ms: u64) -> FetchStep {
    match session.finalize(now_ms) {
        Ok(()) => FetchStep::Finished,
        Err(e) => FetchStep::Failed(e),
    }
}
