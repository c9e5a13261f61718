//! Update pipeline configuration parameters
//!
//! Tunables for the OTA pipeline.  User-facing clock settings live in the
//! clock's own config store; nothing here is persisted.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Smallest accepted fetch read buffer.
const MIN_FETCH_CHUNK: usize = 64;
/// Largest accepted fetch read buffer (must fit the main task stack).
const MAX_FETCH_CHUNK: usize = 4096;

/// OTA pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    // --- Reboot ---
    /// Delay between a successful commit and the restart (milliseconds)
    pub reboot_delay_ms: u32,

    // --- Remote fetch ---
    /// Bytes read from the remote body per main-loop step
    pub fetch_chunk_size: usize,
    /// HTTP client read timeout; a stalled source fails the session after this (milliseconds)
    pub fetch_timeout_ms: u32,
    /// HTTP client receive buffer (bytes); release redirects carry long headers
    pub fetch_buffer_size: usize,

    // --- Image ---
    /// Largest image accepted, matching the OTA slot size (bytes)
    pub max_firmware_size: u32,

    // --- HTTP server ---
    /// Stack size of the httpd task (bytes)
    pub http_stack_size: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            // Reboot
            reboot_delay_ms: 3000,

            // Remote fetch
            fetch_chunk_size: 512,
            fetch_timeout_ms: 30_000,
            fetch_buffer_size: 4096,

            // Image
            max_firmware_size: 0x1E_0000, // 1.875 MB OTA slot

            // HTTP server
            http_stack_size: 10_240,
        }
    }
}

impl UpdateConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reboot_delay_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "reboot_delay_ms must leave time for a status poll",
            ));
        }
        if !(MIN_FETCH_CHUNK..=MAX_FETCH_CHUNK).contains(&self.fetch_chunk_size) {
            return Err(ConfigError::ValidationFailed(
                "fetch_chunk_size must be 64..=4096",
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("fetch_timeout_ms must be > 0"));
        }
        if self.fetch_buffer_size < self.fetch_chunk_size {
            return Err(ConfigError::ValidationFailed(
                "fetch_buffer_size must hold at least one chunk",
            ));
        }
        if self.max_firmware_size == 0 {
            return Err(ConfigError::ValidationFailed("max_firmware_size must be > 0"));
        }
        Ok(())
    }
}

/// Errors from [`UpdateConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
