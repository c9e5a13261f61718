//! ClockClock firmware: main entry point.
//!
//! Hexagonal layout around the update pipeline.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ClockDevice     OtaFlash     EspFirmwareSource  LogEventSink  │
//! │  (Device+Time)   (FlashSink)  (FirmwareSource)   (EventSink)   │
//! │  http_server (httpd task)        network (WiFi STA)            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         UpdateService (pure logic, behind UpdateApi)   │    │
//! │  │  Session · Upload · Fetch · Status · Reboot            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyOutputPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::rmt::TxRmtDriver;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use clockclock::adapters::device::ClockDevice;
use clockclock::adapters::flash::OtaFlash;
use clockclock::adapters::http_client::EspFirmwareSource;
use clockclock::adapters::log_sink::LogEventSink;
use clockclock::adapters::time::MonotonicClock;
use clockclock::adapters::{http_server, network};
use clockclock::api::UpdateApi;
use clockclock::app::ports::TimePort;
use clockclock::board;
use clockclock::config::UpdateConfig;
use clockclock::drivers::led_patterns::LedStatus;
use clockclock::drivers::status_led::StatusLed;
use clockclock::ota::{self, UpdateService};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("ClockClock v{} on {}", env!("CARGO_PKG_VERSION"), board::BOARD_NAME);

    // ── 1b. Keep this image ───────────────────────────────────
    ota::check_rollback();

    let config = UpdateConfig::default();
    config.validate().map_err(|e| anyhow!("update config: {e}"))?;

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let clock = MonotonicClock::new();

    // SAFETY: the status LED GPIO is not claimed anywhere else.
    let led_pin = unsafe { AnyOutputPin::new(board::STATUS_LED_GPIO) };
    let tx = TxRmtDriver::new(
        peripherals.rmt.channel0,
        led_pin,
        &TransmitConfig::new().clock_divider(1),
    )?;
    let led = Arc::new(Mutex::new(StatusLed::new(tx)));
    lock(&led).set_status(LedStatus::Connecting, clock.uptime_ms());

    // ── 3. Network ────────────────────────────────────────────
    let _wifi = match network::connect_station(peripherals.modem, sys_loop, nvs) {
        Ok(wifi) => {
            lock(&led).set_status(LedStatus::Connected, clock.uptime_ms());
            Some(wifi)
        }
        Err(e) => {
            warn!("wifi: {e:#}; update API unreachable until reboot");
            lock(&led).set_status(LedStatus::Error, clock.uptime_ms());
            None
        }
    };

    // ── 4. Update pipeline ────────────────────────────────────
    // Hook for the external hands-animation driver, which is not part of this
    // crate. The pipeline clears it once an update starts; nothing here reads it.
    let animation_enabled = Arc::new(AtomicBool::new(true));
    let service = UpdateService::new(OtaFlash::new(), EspFirmwareSource::new(&config), &config);
    let device = ClockDevice::new(Arc::clone(&led), Arc::clone(&animation_enabled));
    let api = Arc::new(Mutex::new(UpdateApi::new(service, device, LogEventSink::new())));

    let _server = http_server::start(&api, &config)?;
    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    loop {
        {
            let mut api = lock(&api);
            api.poll();
            api.tick();
        }
        lock(&led).update(clock.uptime_ms());
        FreeRtos::delay_ms(1);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
