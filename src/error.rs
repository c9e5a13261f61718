//! Unified error types for the update pipeline.
//!
//! Every variant is `Copy` so errors can be recorded into the session and
//! returned to the HTTP layer without allocation.  The `Display` text is what
//! ends up in the status snapshot's `error` field, so it is written for the
//! person looking at the web UI.

use core::fmt;

// ---------------------------------------------------------------------------
// Flash sink errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`FlashSink`](crate::app::ports::FlashSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// No inactive OTA partition to write into.
    NoPartition,
    /// The platform refused to open the partition for writing.
    BeginFailed,
    /// A write to the partition failed or was short.
    WriteFailed,
    /// The written image failed platform validation on commit.
    VerifyFailed,
    /// The image is valid but could not be selected as the boot slot.
    BootSetFailed,
    /// The sink was used out of order (write before begin, etc).
    NotOpen,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no inactive OTA partition"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "image verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::NotOpen => write!(f, "flash sink not open"),
        }
    }
}

// ---------------------------------------------------------------------------
// Firmware source errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`FirmwareSource`](crate::app::ports::FirmwareSource)
/// or its body reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceError {
    /// The HTTP client could not be created or the request not submitted.
    Init,
    /// The connection dropped mid-body.
    Io,
    /// No bytes arrived within the configured client timeout.
    Timeout,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "HTTP client init failed"),
            Self::Io => write!(f, "connection error"),
            Self::Timeout => write!(f, "read timed out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Update errors
// ---------------------------------------------------------------------------

/// Everything that can end (or refuse to start) an update session.
///
/// All variants except [`SessionBusy`](Self::SessionBusy) and
/// [`NotReceiving`](Self::NotReceiving) are terminal for the session that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// `start()` while another session is still running.
    SessionBusy,
    /// The flash sink could not be opened.
    FlashOpenFailed(FlashError),
    /// First chunk does not carry the ESP image magic byte.
    InvalidSignature,
    /// The flash sink rejected a chunk.
    WriteFailed(FlashError),
    /// A chunk would take the image past its declared size.
    Overflow,
    /// Byte count at end of transfer differs from the declared size.
    SizeMismatch,
    /// The flash sink refused to commit the image.
    FinalizeFailed(FlashError),
    /// The outbound HTTP client could not be set up.
    HttpInitFailed,
    /// Remote source answered with a non-2xx status.
    HttpStatus(u16),
    /// Remote source did not declare a usable content length.
    MissingContentLength,
    /// The remote body could not be read to the end.
    DownloadFailed,
    /// The remote body stopped arriving.
    DownloadStalled,
    /// Declared size exceeds the OTA partition budget.
    ImageTooLarge,
    /// The session was cancelled through the API or an aborted upload.
    UserCancelled,
    /// A chunk arrived while no transfer is accepting bytes.
    NotReceiving,
    /// The upload request carried no file part.
    EmptyUpload,
    /// The upload body could not be decoded as `multipart/form-data`.
    MalformedUpload,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionBusy => write!(f, "Update already in progress"),
            Self::FlashOpenFailed(e) => write!(f, "Failed to start update: {e}"),
            Self::InvalidSignature => write!(f, "Invalid firmware signature"),
            Self::WriteFailed(_) => write!(f, "Failed to write firmware data"),
            Self::Overflow => write!(f, "Firmware exceeds declared size"),
            Self::SizeMismatch => write!(f, "Upload size mismatch"),
            Self::FinalizeFailed(e) => write!(f, "Failed to finish update: {e}"),
            Self::HttpInitFailed => write!(f, "Failed to initialize HTTP client"),
            Self::HttpStatus(code) => write!(f, "HTTP error: {code}"),
            Self::MissingContentLength => write!(f, "Invalid content length"),
            Self::DownloadFailed => write!(f, "Firmware download failed"),
            Self::DownloadStalled => write!(f, "Firmware download stalled"),
            Self::ImageTooLarge => write!(f, "Firmware image too large"),
            Self::UserCancelled => write!(f, "Update cancelled by user"),
            Self::NotReceiving => write!(f, "No update is receiving data"),
            Self::EmptyUpload => write!(f, "No firmware file in request"),
            Self::MalformedUpload => write!(f, "Malformed upload request"),
        }
    }
}

impl From<SourceError> for UpdateError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Init => Self::HttpInitFailed,
            SourceError::Io => Self::DownloadFailed,
            SourceError::Timeout => Self::DownloadStalled,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Update-pipeline `Result` alias.
pub type Result<T> = core::result::Result<T, UpdateError>;
