//! WS2812 status LED driver.
//!
//! A single addressable LED on the board's status pin, driven through an
//! RMT channel.  Brightness is scaled down by
//! [`STATUS_LED_BRIGHTNESS`](crate::board::STATUS_LED_BRIGHTNESS) before
//! the colour goes on the wire.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: encodes the 24-bit colour as RMT pulses and transmits it.
//! On host/test: tracks state in-memory only.

use super::led_patterns::{LedStatus, Rgb, StatusPattern};
use crate::board;

#[cfg(target_os = "espidf")]
use esp_idf_hal::rmt::TxRmtDriver;

pub struct StatusLed {
    pattern: StatusPattern,
    current: Rgb,
    #[cfg(target_os = "espidf")]
    tx: TxRmtDriver<'static>,
}

impl StatusLed {
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            pattern: StatusPattern::new(),
            current: (0, 0, 0),
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn new(tx: TxRmtDriver<'static>) -> Self {
        Self {
            pattern: StatusPattern::new(),
            current: (0, 0, 0),
            tx,
        }
    }

    pub fn set_status(&mut self, status: LedStatus, now_ms: u64) {
        self.pattern.set_status(status);
        self.update(now_ms);
    }

    pub fn status(&self) -> LedStatus {
        self.pattern.status()
    }

    /// Advance blinking patterns; call from every loop iteration and from
    /// long-running operations.
    pub fn update(&mut self, now_ms: u64) {
        if let Some((r, g, b)) = self.pattern.tick(now_ms) {
            self.write(r, g, b);
        }
    }

    pub fn current_colour(&self) -> Rgb {
        self.current
    }

    fn write(&mut self, r: u8, g: u8, b: u8) {
        self.current = (r, g, b);
        let scaled = [r, g, b].map(|c| scale(c, board::STATUS_LED_BRIGHTNESS));
        let wire = board::wire_order(scaled[0], scaled[1], scaled[2]);
        self.transmit(wire);
    }

    #[cfg(target_os = "espidf")]
    fn transmit(&mut self, wire: [u8; 3]) {
        if let Err(e) = ws2812::send(&mut self.tx, wire) {
            log::warn!("status LED: RMT transmit failed: {:?}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn transmit(&mut self, _wire: [u8; 3]) {}
}

#[cfg(not(target_os = "espidf"))]
impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}

fn scale(channel: u8, brightness: u8) -> u8 {
    ((channel as u16 * brightness as u16) / 255) as u8
}

#[cfg(target_os = "espidf")]
mod ws2812 {
    use core::time::Duration;

    use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};
    use esp_idf_svc::sys::EspError;

    /// Transmit one 24-bit colour, MSB first, in wire byte order.
    pub fn send(tx: &mut TxRmtDriver<'static>, wire: [u8; 3]) -> Result<(), EspError> {
        let ticks_hz = tx.counter_clock()?;
        let t0h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(350))?;
        let t0l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(800))?;
        let t1h = Pulse::new_with_duration(ticks_hz, PinState::High, &Duration::from_nanos(700))?;
        let t1l = Pulse::new_with_duration(ticks_hz, PinState::Low, &Duration::from_nanos(600))?;

        let word = u32::from_be_bytes([0, wire[0], wire[1], wire[2]]);
        let mut signal = FixedLengthSignal::<24>::new();
        for i in 0..24 {
            let bit = word & (1 << (23 - i)) != 0;
            let pair = if bit { (t1h, t1l) } else { (t0h, t0l) };
            signal.set(i, &pair)?;
        }
        tx.start_blocking(&signal)
    }
}
