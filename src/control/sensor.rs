//! Light-triggered LED control

use super::DeviceState;
use crate::device::{DeviceDrivers, LightLevel};
use iot_shared::state_machine::{BrightnessTracker, LightTransition};
use tracing::{info, warn};

/// Turns the LED off when it gets bright and on when it gets dark
///
/// Only changes of the reading matter: a steady reading never touches the
/// LED, so manual LED commands stick until the light changes.
#[derive(Debug, Default)]
pub struct SensorMonitor {
    tracker: BrightnessTracker,
}

impl SensorMonitor {
    pub fn new() -> Self {
        Self {
            tracker: BrightnessTracker::new(),
        }
    }

    /// Take one reading and apply the transition it causes, if any
    pub async fn poll(
        &mut self,
        drivers: &dyn DeviceDrivers,
        state: &mut DeviceState,
    ) -> Option<LightTransition> {
        let level = match drivers.read_brightness().await {
            Ok(level) => level,
            Err(e) => {
                warn!("[DEVICE] Light sensor read failed: {}", e);
                LightLevel::Dark
            }
        };

        let transition = self.tracker.observe(level.is_bright())?;
        match transition {
            LightTransition::BecameBright if state.led_on => match drivers.set_led(false).await {
                Ok(()) => {
                    state.led_on = false;
                    info!("[DEVICE] Light detected - LED OFF");
                }
                Err(e) => warn!("[DEVICE] Failed to turn LED off: {}", e),
            },
            LightTransition::BecameDark if !state.led_on => match drivers.set_led(true).await {
                Ok(()) => {
                    state.led_on = true;
                    info!("[DEVICE] Dark detected - LED ON");
                }
                Err(e) => warn!("[DEVICE] Failed to turn LED on: {}", e),
            },
            _ => {}
        }
        Some(transition)
    }
}
