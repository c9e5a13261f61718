//! Board definitions for the supported ClockClock controller boards.
//!
//! Single source of truth for board identity and the status LED wiring.
//! The board is selected at build time with a cargo feature; the OTA
//! `/api/update/target` route reports [`BOARD_TARGET`] so the web UI can pick
//! the matching release asset.

/// Byte order the on-board WS2812 expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourOrder {
    Grb,
    Rgb,
}

// ---------------------------------------------------------------------------
// LOLIN S3 Mini
// ---------------------------------------------------------------------------

#[cfg(feature = "board-s3-mini")]
mod selected {
    use super::ColourOrder;

    pub const BOARD_NAME: &str = "LOLIN S3 Mini";
    pub const BOARD_TARGET: &str = "lolin_s3_mini";
    pub const STATUS_LED_GPIO: i32 = 47;
    pub const STATUS_LED_ORDER: ColourOrder = ColourOrder::Rgb;
}

// ---------------------------------------------------------------------------
// LOLIN C3 Mini
// ---------------------------------------------------------------------------

#[cfg(all(feature = "board-c3-mini", not(feature = "board-s3-mini")))]
mod selected {
    use super::ColourOrder;

    pub const BOARD_NAME: &str = "LOLIN C3 Mini";
    pub const BOARD_TARGET: &str = "lolin_c3_mini";
    pub const STATUS_LED_GPIO: i32 = 7;
    pub const STATUS_LED_ORDER: ColourOrder = ColourOrder::Grb;
}

#[cfg(not(any(feature = "board-s3-mini", feature = "board-c3-mini")))]
compile_error!("select a board: enable `board-s3-mini` or `board-c3-mini`");

pub use selected::*;

/// Global brightness applied to the status LED (0–255).
pub const STATUS_LED_BRIGHTNESS: u8 = 3;

/// Encode an RGB colour in the byte order the board's LED expects.
pub fn wire_order(r: u8, g: u8, b: u8) -> [u8; 3] {
    match STATUS_LED_ORDER {
        ColourOrder::Grb => [g, r, b],
        ColourOrder::Rgb => [r, g, b],
    }
}
