//! Simulated devices that fail on demand

use super::{DeviceDrivers, DriverError, LightLevel, Melody, SimulatedDrivers};
use async_trait::async_trait;
use iot_shared::Brightness;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Mutex, PoisonError};

/// Device that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// `set_led` and `set_brightness`
    Led,
    /// `play_melody` and `stop_melody`
    Buzzer,
    /// `read_brightness`
    Sensor,
    /// `show_digit`
    Display,
}

/// Wraps [`SimulatedDrivers`]; calls on a failing device return an error
/// without touching the simulated outputs
#[derive(Debug, Default)]
pub struct FaultyDrivers {
    inner: SimulatedDrivers,
    failing: Mutex<HashSet<Fault>>,
}

impl FaultyDrivers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fault: Fault) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fault);
    }

    fn check(&self, fault: Fault) -> Result<(), DriverError> {
        let failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(&fault) {
            return Err(DriverError::Gpio(format!("{:?} not responding", fault)));
        }
        Ok(())
    }
}

impl Deref for FaultyDrivers {
    type Target = SimulatedDrivers;

    fn deref(&self) -> &SimulatedDrivers {
        &self.inner
    }
}

#[async_trait]
impl DeviceDrivers for FaultyDrivers {
    async fn set_led(&self, on: bool) -> Result<(), DriverError> {
        self.check(Fault::Led)?;
        self.inner.set_led(on).await
    }

    async fn set_brightness(&self, level: Brightness) -> Result<(), DriverError> {
        self.check(Fault::Led)?;
        self.inner.set_brightness(level).await
    }

    async fn play_melody(&self, melody: Melody) -> Result<(), DriverError> {
        self.check(Fault::Buzzer)?;
        self.inner.play_melody(melody).await
    }

    async fn stop_melody(&self) -> Result<(), DriverError> {
        self.check(Fault::Buzzer)?;
        self.inner.stop_melody().await
    }

    async fn read_brightness(&self) -> Result<LightLevel, DriverError> {
        self.check(Fault::Sensor)?;
        self.inner.read_brightness().await
    }

    async fn show_digit(&self, digit: u8) -> Result<(), DriverError> {
        self.check(Fault::Display)?;
        self.inner.show_digit(digit).await
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.inner.shutdown().await
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}
