//! Device adapter: the update pipeline's view of the rest of the clock.
//!
//! Implements [`DevicePort`] and [`TimePort`].  The status LED is shared
//! with the main loop (which keeps it blinking between chunks), and the
//! hands animation is stopped by clearing a shared flag.  The animation
//! driver that reads the flag lives outside this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::app::ports::{DevicePort, TimePort};
use crate::drivers::led_patterns::LedStatus;
use crate::drivers::status_led::StatusLed;

use super::time::MonotonicClock;

pub struct ClockDevice {
    led: Arc<Mutex<StatusLed>>,
    animation_enabled: Arc<AtomicBool>,
    clock: MonotonicClock,
    #[cfg(not(target_os = "espidf"))]
    restart_requested: bool,
}

impl ClockDevice {
    pub fn new(led: Arc<Mutex<StatusLed>>, animation_enabled: Arc<AtomicBool>) -> Self {
        Self {
            led,
            animation_enabled,
            clock: MonotonicClock::new(),
            #[cfg(not(target_os = "espidf"))]
            restart_requested: false,
        }
    }

    /// `true` once the pipeline has asked for a restart (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    fn with_led(&self, f: impl FnOnce(&mut StatusLed, u64)) {
        let now = self.clock.uptime_ms();
        let mut led = self.led.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut led, now);
    }
}

impl DevicePort for ClockDevice {
    fn stop_animation(&mut self) {
        if self.animation_enabled.swap(false, Ordering::AcqRel) {
            info!("device: animation stopped for update");
        }
    }

    fn set_status_indicator(&mut self, status: LedStatus) {
        self.with_led(|led, now| led.set_status(status, now));
    }

    fn update_status_indicator(&mut self) {
        self.with_led(|led, now| led.update(now));
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("device: restarting");
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        info!("device (sim): restart requested");
        self.restart_requested = true;
    }
}

impl TimePort for ClockDevice {
    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}
