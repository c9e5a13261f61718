//! Status indicator pattern engine.
//!
//! Turns a [`LedStatus`] into the colour the status LED should show right
//! now.  Steady states produce their colour once; blinking states toggle
//! every [`BLINK_PERIOD_MS`] and rely on `tick()` being called often (the
//! OTA path calls it once per written chunk).
//!
//! | Status      | Pattern                 |
//! |-------------|-------------------------|
//! | Off         | black                   |
//! | Connecting  | blue blink, 400 ms      |
//! | Connected   | solid green             |
//! | Update      | yellow blink, 400 ms    |
//! | Error       | solid red               |

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// Half-period of the blinking patterns.
pub const BLINK_PERIOD_MS: u64 = 400;

pub const COLOUR_OFF: Rgb = (0, 0, 0);
pub const COLOUR_CONNECTING: Rgb = (0, 0, 255); // Blue
pub const COLOUR_CONNECTED: Rgb = (0, 255, 0); // Green
pub const COLOUR_UPDATE: Rgb = (255, 255, 0); // Yellow
pub const COLOUR_ERROR: Rgb = (255, 0, 0); // Red

/// What the device wants to tell the user through the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedStatus {
    Off,
    Connecting,
    Connected,
    Update,
    Error,
}

impl LedStatus {
    fn blink_colour(self) -> Option<Rgb> {
        match self {
            Self::Connecting => Some(COLOUR_CONNECTING),
            Self::Update => Some(COLOUR_UPDATE),
            _ => None,
        }
    }

    fn steady_colour(self) -> Rgb {
        match self {
            Self::Off => COLOUR_OFF,
            Self::Connected => COLOUR_CONNECTED,
            Self::Error => COLOUR_ERROR,
            Self::Connecting | Self::Update => COLOUR_OFF,
        }
    }
}

/// Pattern engine. Stack-allocated, no heap.
pub struct StatusPattern {
    status: LedStatus,
    last_toggle_ms: u64,
    blink_on: bool,
    /// Colour waiting to be pushed to the LED.
    pending: Option<Rgb>,
}

impl StatusPattern {
    pub fn new() -> Self {
        Self {
            status: LedStatus::Off,
            last_toggle_ms: 0,
            blink_on: false,
            pending: Some(COLOUR_OFF),
        }
    }

    pub fn status(&self) -> LedStatus {
        self.status
    }

    /// Switch status.  Steady colours are queued immediately; blinking
    /// patterns start on the next `tick()`.
    pub fn set_status(&mut self, status: LedStatus) {
        self.status = status;
        if status.blink_colour().is_none() {
            self.pending = Some(status.steady_colour());
        }
    }

    /// Advance the pattern.  Returns a colour only when the LED needs to
    /// be rewritten.
    pub fn tick(&mut self, now_ms: u64) -> Option<Rgb> {
        if let Some(colour) = self.status.blink_colour() {
            if now_ms.saturating_sub(self.last_toggle_ms) >= BLINK_PERIOD_MS {
                self.last_toggle_ms = now_ms;
                self.blink_on = !self.blink_on;
                self.pending = Some(if self.blink_on { colour } else { COLOUR_OFF });
            }
        }
        self.pending.take()
    }
}

impl Default for StatusPattern {
    fn default() -> Self {
        Self::new()
    }
}
