//! WiFi station bring-up.
//!
//! Association, AP fallback and the captive portal belong to the clock's
//! connectivity layer.  This is the minimal station join the update API
//! needs to be reachable, with credentials baked in at build time through
//! `WIFI_SSID` / `WIFI_PASS`.

use anyhow::{Result, anyhow, bail};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

const SSID: Option<&str> = option_env!("WIFI_SSID");
const PASSWORD: Option<&str> = option_env!("WIFI_PASS");

/// Join the configured network and wait for an IP.  The returned handle
/// must stay alive for the connection to persist.
pub fn connect_station(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<BlockingWifi<EspWifi<'static>>> {
    let ssid = SSID.unwrap_or("");
    let password = PASSWORD.unwrap_or("");
    if ssid.is_empty() {
        bail!("WIFI_SSID not set at build time");
    }

    let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|()| anyhow!("SSID too long: {}", ssid))?,
        password: password
            .try_into()
            .map_err(|()| anyhow!("WiFi password too long"))?,
        auth_method: if password.is_empty() {
            warn!("wifi: empty password, joining open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi: connecting to '{}'", ssid);
    wifi.connect()?;
    wifi.wait_netif_up()?;

    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    info!("wifi: connected, ip={}", ip.ip);
    Ok(wifi)
}
