//! Device driver abstraction for pluggable hardware backends
//!
//! The device control loop only talks to hardware through [`DeviceDrivers`].
//! Two backends exist:
//! - [`simulated::SimulatedDrivers`]: in-memory devices for development and tests
//! - `rpi::RpiDrivers` (feature `rpi`): GPIO pins on a Raspberry Pi

#[cfg(test)]
pub mod faulty;
pub mod melody;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod simulated;

pub use melody::Melody;
pub use simulated::SimulatedDrivers;

use crate::config::{DriverBackend, ServerConfig};
use async_trait::async_trait;
use iot_shared::Brightness;
use std::sync::Arc;
use thiserror::Error;

/// PWM range of the LED output; the LED is wired active-low
pub const PWM_RANGE: u8 = 100;

/// PWM value that switches the LED off
pub const PWM_LED_OFF: u8 = PWM_RANGE;

/// PWM value that drives the LED at full brightness
pub const PWM_LED_FULL: u8 = 0;

/// PWM output value for a brightness level
pub fn brightness_pwm(level: Brightness) -> u8 {
    match level {
        Brightness::Low => PWM_RANGE - 33,
        Brightness::Medium => PWM_RANGE - 66,
        Brightness::High => PWM_LED_FULL,
    }
}

/// Reading category of the light sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLevel {
    Bright,
    Dark,
}

impl LightLevel {
    pub fn is_bright(self) -> bool {
        self == LightLevel::Bright
    }
}

/// Errors reported by device drivers
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Invalid digit: {0} (must be 0-9)")]
    InvalidDigit(u8),

    #[error("Device not available: {0}")]
    Unavailable(&'static str),
}

/// Blocking operations on the physical devices
///
/// Every operation completes (or fails) before returning; `play_melody` only
/// returns once the whole melody has played or `stop_melody` was called.
#[async_trait]
pub trait DeviceDrivers: Send + Sync + 'static {
    /// Switch the LED fully on or off
    async fn set_led(&self, on: bool) -> Result<(), DriverError>;

    /// Light the LED at the given brightness level
    async fn set_brightness(&self, level: Brightness) -> Result<(), DriverError>;

    /// Play a melody to the end
    async fn play_melody(&self, melody: Melody) -> Result<(), DriverError>;

    /// Ask a playing melody to stop after its current note
    async fn stop_melody(&self) -> Result<(), DriverError>;

    /// Read the light sensor
    async fn read_brightness(&self) -> Result<LightLevel, DriverError>;

    /// Show one decimal digit on the seven-segment display
    async fn show_digit(&self, digit: u8) -> Result<(), DriverError>;

    /// Release the devices: LED off, buzzer silent, display cleared
    async fn shutdown(&self) -> Result<(), DriverError>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}

/// Initialize the configured driver backend
pub fn build_drivers(config: &ServerConfig) -> Result<Arc<dyn DeviceDrivers>, DriverError> {
    match config.driver {
        DriverBackend::Simulated => Ok(Arc::new(SimulatedDrivers::new())),
        #[cfg(feature = "rpi")]
        DriverBackend::Rpi => Ok(Arc::new(rpi::RpiDrivers::new(&config.pins)?)),
        #[cfg(not(feature = "rpi"))]
        DriverBackend::Rpi => Err(DriverError::Unavailable(
            "GPIO backend not compiled in (build with --features rpi)",
        )),
    }
}
