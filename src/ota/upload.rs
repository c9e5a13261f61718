//! Direct upload: request body → upload events → session.
//!
//! Two halves:
//!
//! - [`UploadDecoder`] turns raw request bytes into [`UploadEvent`]s.  It
//!   understands `multipart/form-data` (first part with a filename is the
//!   image) and plain `application/octet-stream` bodies.
//! - [`UploadRequest`] applies those events to the shared session and
//!   remembers whether this request failed.
//!
//! The HTTP adapter runs the decoder outside the session lock and only locks
//! to hand each event to [`UploadRequest::handle`].

use log::{debug, warn};

use crate::app::ports::{DevicePort, FlashSink, TimePort};
use crate::error::UpdateError;

use super::multipart::{MultipartDecoder, MultipartEvent, boundary_from_content_type};
use super::session::{Ingestion, UpdateSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent<'a> {
    Start {
        filename: Option<&'a str>,
        total_size: Option<u32>,
    },
    Data(&'a [u8]),
    End {
        total_size: u32,
    },
    /// The client went away mid-transfer.
    Aborted,
}

// ── Request state ─────────────────────────────────────────────

/// Per-request bookkeeping for one upload.
#[derive(Debug, Default)]
pub struct UploadRequest {
    failed: Option<UpdateError>,
    /// Generation of the session this request started, if any.
    session: Option<u32>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> Option<UpdateError> {
        self.failed
    }

    pub fn response_code(&self) -> u16 {
        if self.failed.is_some() { 400 } else { 200 }
    }

    /// Apply one upload event.  Errors are recorded on the request; the
    /// session records its own copy.
    pub fn handle<F: FlashSink>(
        &mut self,
        event: UploadEvent<'_>,
        session: &mut UpdateSession<F>,
        hw: &mut (impl DevicePort + TimePort),
    ) {
        match event {
            UploadEvent::Start {
                filename,
                total_size,
            } => {
                if self.session.is_some() || self.failed.is_some() {
                    return;
                }
                debug!(
                    "OTA: upload start {:?} ({:?} bytes)",
                    filename.unwrap_or("<raw>"),
                    total_size
                );
                let now = hw.uptime_ms();
                match session.start(total_size.unwrap_or(0), Ingestion::Upload, hw, now) {
                    Ok(()) => self.session = Some(session.generation()),
                    Err(e) => self.failed = Some(e),
                }
            }
            UploadEvent::Data(chunk) => {
                if !self.owns(session) {
                    return;
                }
                if let Err(e) = session.write_chunk(chunk, hw) {
                    self.failed = Some(e);
                }
            }
            UploadEvent::End { total_size } => {
                if !self.owns(session) {
                    return;
                }
                if let Err(e) = complete(session, total_size, hw.uptime_ms()) {
                    self.failed = Some(e);
                }
            }
            UploadEvent::Aborted => {
                if self.owns(session) {
                    warn!("OTA: upload aborted by client");
                    session.cancel();
                }
                self.failed.get_or_insert(UpdateError::UserCancelled);
            }
        }
    }

    /// Fail the request for a reason outside the session (bad body
    /// encoding, missing file part).
    pub fn reject<F: FlashSink>(&mut self, err: UpdateError, session: &mut UpdateSession<F>) {
        if self.owns(session) {
            session.fail(err);
        }
        self.failed.get_or_insert(err);
    }

    /// `true` while this request's session is current and no error has
    /// been seen.  Later chunks after a failure are ignored.
    fn owns<F: FlashSink>(&self, session: &UpdateSession<F>) -> bool {
        self.failed.is_none()
            && self.session == Some(session.generation())
            && session.ingestion() == Some(Ingestion::Upload)
    }
}

fn complete<F: FlashSink>(
    session: &mut UpdateSession<F>,
    total_size: u32,
    now_ms: u64,
) -> Result<(), UpdateError> {
    if total_size == 0 || total_size != session.bytes_written() {
        return Err(session.fail(UpdateError::SizeMismatch));
    }
    if session.total_size() == 0 {
        session.declare_total(total_size)?;
    }
    session.finalize(now_ms)
}

// ── Body decoding ─────────────────────────────────────────────

enum Body {
    Multipart(MultipartDecoder),
    Raw { content_length: Option<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilePart {
    NotSeen,
    Open { received: u32 },
    Closed,
}

/// Maps an HTTP request body onto [`UploadEvent`]s.
pub struct UploadDecoder {
    body: Body,
    file: FilePart,
    in_file: bool,
}

impl UploadDecoder {
    /// Pick multipart or raw decoding from the request headers.
    pub fn from_headers(
        content_type: Option<&str>,
        content_length: Option<u64>,
    ) -> Result<Self, UpdateError> {
        let is_multipart = content_type.is_some_and(|ct| {
            ct.trim_start()
                .get(..10)
                .is_some_and(|p| p.eq_ignore_ascii_case("multipart/"))
        });
        let body = if is_multipart {
            let boundary = content_type
                .map(boundary_from_content_type)
                .ok_or(UpdateError::MalformedUpload)?
                .map_err(|_| UpdateError::MalformedUpload)?;
            Body::Multipart(
                MultipartDecoder::new(boundary).map_err(|_| UpdateError::MalformedUpload)?,
            )
        } else {
            Body::Raw {
                content_length: content_length.and_then(|n| u32::try_from(n).ok()),
            }
        };
        Ok(Self {
            body,
            file: FilePart::NotSeen,
            in_file: false,
        })
    }

    /// Decode the next slice of the request body.
    pub fn feed(
        &mut self,
        input: &[u8],
        mut on_event: impl FnMut(UploadEvent<'_>),
    ) -> Result<(), UpdateError> {
        let file = &mut self.file;
        match &mut self.body {
            Body::Raw { content_length } => {
                if input.is_empty() {
                    return Ok(());
                }
                if *file == FilePart::NotSeen {
                    on_event(UploadEvent::Start {
                        filename: None,
                        total_size: *content_length,
                    });
                    *file = FilePart::Open { received: 0 };
                }
                if let FilePart::Open { received } = file {
                    *received = received.saturating_add(len_u32(input));
                    on_event(UploadEvent::Data(input));
                }
                Ok(())
            }
            Body::Multipart(decoder) => {
                let in_file = &mut self.in_file;
                decoder
                    .feed(input, |ev| match ev {
                        MultipartEvent::PartStart { filename: Some(name) }
                            if *file == FilePart::NotSeen =>
                        {
                            *file = FilePart::Open { received: 0 };
                            *in_file = true;
                            on_event(UploadEvent::Start {
                                filename: Some(name),
                                total_size: None,
                            });
                        }
                        MultipartEvent::PartStart { .. } => *in_file = false,
                        MultipartEvent::Data(chunk) if *in_file => {
                            if let FilePart::Open { received } = file {
                                *received = received.saturating_add(len_u32(chunk));
                            }
                            on_event(UploadEvent::Data(chunk));
                        }
                        MultipartEvent::Data(_) => {}
                        MultipartEvent::PartEnd if *in_file => {
                            *in_file = false;
                            if let FilePart::Open { received } = *file {
                                *file = FilePart::Closed;
                                on_event(UploadEvent::End {
                                    total_size: received,
                                });
                            }
                        }
                        MultipartEvent::PartEnd | MultipartEvent::Done => {}
                    })
                    .map_err(|e| {
                        warn!("OTA: upload body rejected: {}", e);
                        UpdateError::MalformedUpload
                    })
            }
        }
    }

    /// The request body is exhausted.
    pub fn finish(&mut self, mut on_event: impl FnMut(UploadEvent<'_>)) -> Result<(), UpdateError> {
        match &self.body {
            Body::Raw { .. } => match self.file {
                FilePart::NotSeen => Err(UpdateError::EmptyUpload),
                FilePart::Open { received } => {
                    self.file = FilePart::Closed;
                    on_event(UploadEvent::End {
                        total_size: received,
                    });
                    Ok(())
                }
                FilePart::Closed => Ok(()),
            },
            Body::Multipart(decoder) => {
                decoder.finish().map_err(|_| UpdateError::MalformedUpload)?;
                match self.file {
                    FilePart::NotSeen => Err(UpdateError::EmptyUpload),
                    FilePart::Open { .. } => Err(UpdateError::MalformedUpload),
                    FilePart::Closed => Ok(()),
                }
            }
        }
    }
}

fn len_u32(data: &[u8]) -> u32 {
    u32::try_from(data.len()).unwrap_or(u32::MAX)
}
