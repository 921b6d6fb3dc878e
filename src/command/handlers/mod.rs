//! Command handlers for the device command kinds

mod buzzer;
mod led;
mod segment;
mod sensor;

pub use buzzer::{handle_buzzer_off, handle_buzzer_on};
pub use led::{handle_led_off, handle_led_on, handle_set_brightness};
pub use segment::{handle_segment_display, handle_segment_stop};
pub use sensor::{handle_sensor_off, handle_sensor_on};

use crate::control::{Countdown, DeviceState};
use crate::device::DeviceDrivers;

/// Context passed to command handlers
pub struct HandlerContext<'a> {
    pub drivers: &'a dyn DeviceDrivers,
    pub state: &'a mut DeviceState,
    pub countdown: &'a mut Countdown,
}
