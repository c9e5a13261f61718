//! Status LED pattern engine and WS2812 driver.

pub mod led_patterns;
pub mod status_led;
