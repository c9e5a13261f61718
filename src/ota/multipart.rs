//! Streaming `multipart/form-data` decoder.
//!
//! Bytes are pushed in whatever chunks the socket delivers.  Part bodies are
//! passed through as they arrive; the decoder only holds back the tail that
//! could still be the start of the next delimiter (`\r\n--boundary`), plus
//! part headers up to [`MAX_HEADER_LEN`].
//!
//! ```text
//!  Preamble ──delim──▶ AfterBoundary ──CRLF──▶ Headers ──CRLFCRLF──▶ Body
//!                          │  ▲                                      │
//!                          │  └────────────────delim─────────────────┘
//!                          └──"--"──▶ Done
//! ```

use core::fmt;

/// Part header block limit.
pub const MAX_HEADER_LEN: usize = 1024;

/// RFC 2046 boundary limit.
pub const MAX_BOUNDARY_LEN: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    MissingBoundary,
    BoundaryTooLong,
    Malformed,
    HeadersTooLarge,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBoundary => write!(f, "missing multipart boundary"),
            Self::BoundaryTooLong => write!(f, "multipart boundary too long"),
            Self::Malformed => write!(f, "malformed multipart body"),
            Self::HeadersTooLarge => write!(f, "part headers too large"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MultipartEvent<'a> {
    /// A new part begins.  `filename` comes from `Content-Disposition`.
    PartStart { filename: Option<&'a str> },
    Data(&'a [u8]),
    PartEnd,
    /// Closing delimiter seen; anything after it is ignored.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterBoundary,
    Headers,
    Body,
    Done,
}

pub struct MultipartDecoder {
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    state: State,
}

impl MultipartDecoder {
    pub fn new(boundary: &str) -> Result<Self, MultipartError> {
        if boundary.is_empty() {
            return Err(MultipartError::MissingBoundary);
        }
        if boundary.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::BoundaryTooLong);
        }
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Ok(Self {
            delimiter,
            // Seeded so a body opening directly with `--boundary` matches.
            buf: b"\r\n".to_vec(),
            state: State::Preamble,
        })
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Push the next slice of the request body.
    pub fn feed(
        &mut self,
        input: &[u8],
        mut on_event: impl FnMut(MultipartEvent<'_>),
    ) -> Result<(), MultipartError> {
        if self.state == State::Done {
            return Ok(());
        }
        self.buf.extend_from_slice(input);

        loop {
            match self.state {
                State::Preamble => match find(&self.buf, &self.delimiter) {
                    Some(at) => {
                        self.buf.drain(..at + self.delimiter.len());
                        self.state = State::AfterBoundary;
                    }
                    None => {
                        self.keep_tail();
                        return Ok(());
                    }
                },
                State::AfterBoundary => {
                    if self.buf.len() < 2 {
                        return Ok(());
                    }
                    match &self.buf[..2] {
                        b"--" => {
                            self.buf.clear();
                            self.state = State::Done;
                            on_event(MultipartEvent::Done);
                            return Ok(());
                        }
                        b"\r\n" => {
                            self.buf.drain(..2);
                            self.state = State::Headers;
                        }
                        _ => return Err(MultipartError::Malformed),
                    }
                }
                State::Headers => {
                    let end = if self.buf.starts_with(b"\r\n") {
                        Some((0, 2))
                    } else {
                        find(&self.buf, b"\r\n\r\n").map(|at| (at, at + 4))
                    };
                    let Some((header_len, consumed)) = end else {
                        if self.buf.len() > MAX_HEADER_LEN {
                            return Err(MultipartError::HeadersTooLarge);
                        }
                        return Ok(());
                    };
                    if header_len > MAX_HEADER_LEN {
                        return Err(MultipartError::HeadersTooLarge);
                    }
                    let filename = core::str::from_utf8(&self.buf[..header_len])
                        .ok()
                        .and_then(filename_param);
                    on_event(MultipartEvent::PartStart { filename });
                    self.buf.drain(..consumed);
                    self.state = State::Body;
                }
                State::Body => match find(&self.buf, &self.delimiter) {
                    Some(at) => {
                        if at > 0 {
                            on_event(MultipartEvent::Data(&self.buf[..at]));
                        }
                        on_event(MultipartEvent::PartEnd);
                        self.buf.drain(..at + self.delimiter.len());
                        self.state = State::AfterBoundary;
                    }
                    None => {
                        let keep = self.delimiter.len() - 1;
                        if self.buf.len() > keep {
                            let emit = self.buf.len() - keep;
                            on_event(MultipartEvent::Data(&self.buf[..emit]));
                            self.buf.drain(..emit);
                        }
                        return Ok(());
                    }
                },
                State::Done => return Ok(()),
            }
        }
    }

    /// Call once the request body is exhausted.
    pub fn finish(&self) -> Result<(), MultipartError> {
        if self.state == State::Done {
            Ok(())
        } else {
            Err(MultipartError::Malformed)
        }
    }

    fn keep_tail(&mut self) {
        let keep = self.delimiter.len() - 1;
        if self.buf.len() > keep {
            self.buf.drain(..self.buf.len() - keep);
        }
    }
}

/// Extract the boundary parameter from a `multipart/form-data` content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<&str, MultipartError> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or("").trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::MissingBoundary);
    }
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("boundary") {
            continue;
        }
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            return Err(MultipartError::MissingBoundary);
        }
        if value.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::BoundaryTooLong);
        }
        return Ok(value);
    }
    Err(MultipartError::MissingBoundary)
}

fn filename_param(headers: &str) -> Option<&str> {
    headers
        .split("\r\n")
        .filter(|line| {
            line.get(..20)
                .is_some_and(|h| h.eq_ignore_ascii_case("content-disposition:"))
        })
        .flat_map(|line| line.split(';').skip(1))
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("filename")
                .then(|| value.trim().trim_matches('"'))
        })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
