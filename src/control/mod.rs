//! Device control loop
//!
//! A single task owns the device state and is the only consumer of the
//! command queue. Between commands it polls the light sensor; timer-driven
//! work (countdown, bell) reports back to it as [`LoopEvent`]s.

pub mod countdown;
mod device_loop;
pub mod sensor;

pub use countdown::Countdown;
pub use device_loop::DeviceControlLoop;
pub use sensor::SensorMonitor;

use iot_shared::Brightness;

/// Shared view of what the devices are currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceState {
    pub led_on: bool,
    pub led_brightness: Brightness,
    pub buzzer_playing: bool,
    pub sensor_monitoring: bool,
    pub segment_counting: bool,
}

/// Notifications from background device work to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// A countdown reached 0 without being stopped
    CountdownFinished { generation: u64 },
    /// The bell that follows a countdown has finished
    MelodyFinished,
}
