//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements             | Connects to                  |
//! |---------------|------------------------|------------------------------|
//! | `device`      | DevicePort, TimePort   | status LED, animation, reset |
//! | `flash`       | FlashSink              | inactive OTA slot (esp-ota)  |
//! | `http_client` | FirmwareSource         | ESP-IDF HTTP(S) client       |
//! | `http_server` | (drives `api`)         | ESP-IDF httpd                |
//! | `log_sink`    | EventSink              | Serial log output            |
//! | `network`     | n/a                    | ESP-IDF WiFi STA             |
//! | `time`        | TimePort               | ESP32 system timer           |

pub mod device;
pub mod flash;
#[cfg(target_os = "espidf")]
pub mod http_client;
#[cfg(target_os = "espidf")]
pub mod http_server;
pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod network;
pub mod time;
