//! Simulated device backend
//!
//! Keeps device outputs in memory so the server runs on any machine. Melodies
//! take their real playing time.

use super::{brightness_pwm, DeviceDrivers, DriverError, LightLevel, Melody, PWM_LED_FULL, PWM_LED_OFF};
use async_trait::async_trait;
use iot_shared::Brightness;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Observable outputs of the simulated devices
#[derive(Debug, Clone, PartialEq)]
pub struct SimSnapshot {
    /// Current PWM value on the LED pin
    pub led_pwm: u8,
    /// Number of writes to the LED pin
    pub led_writes: u32,
    /// Digits shown on the display, oldest first
    pub digits_shown: Vec<u8>,
    /// Frequency currently sounding on the buzzer (0 = silent)
    pub tone_hz: f64,
    pub melodies_started: u32,
    pub melodies_completed: u32,
    pub melodies_stopped: u32,
    pub light_reads: u32,
}

impl SimSnapshot {
    pub fn led_on(&self) -> bool {
        self.led_pwm != PWM_LED_OFF
    }
}

impl fmt::Display for SimSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "led {} (pwm={}, {} writes), digits {:?}, tone {} Hz, melodies {}/{}/{} started/completed/stopped, {} light reads",
            if self.led_on() { "on" } else { "off" },
            self.led_pwm,
            self.led_writes,
            self.digits_shown,
            self.tone_hz,
            self.melodies_started,
            self.melodies_completed,
            self.melodies_stopped,
            self.light_reads,
        )
    }
}

impl Default for SimSnapshot {
    fn default() -> Self {
        Self {
            led_pwm: PWM_LED_OFF,
            led_writes: 0,
            digits_shown: Vec::new(),
            tone_hz: 0.0,
            melodies_started: 0,
            melodies_completed: 0,
            melodies_stopped: 0,
            light_reads: 0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    outputs: SimSnapshot,
    light_script: VecDeque<LightLevel>,
    light_level: LightLevel,
}

/// In-memory implementation of all devices
#[derive(Debug)]
pub struct SimulatedDrivers {
    state: Mutex<SimState>,
    stop_melody: AtomicBool,
    latency: Duration,
}

impl SimulatedDrivers {
    /// Create simulated devices in their power-on state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                outputs: SimSnapshot::default(),
                light_script: VecDeque::new(),
                light_level: LightLevel::Dark,
            }),
            stop_melody: AtomicBool::new(false),
            latency: Duration::ZERO,
        }
    }

    /// Delay every LED write by `latency`
    #[cfg(test)]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue sensor readings; once used up the last one keeps being returned
    #[cfg(test)]
    pub fn script_light(&self, levels: impl IntoIterator<Item = LightLevel>) {
        self.lock().light_script.extend(levels);
    }

    /// Set the ambient light level returned when no script is pending
    #[cfg(test)]
    pub fn set_light(&self, level: LightLevel) {
        let mut state = self.lock();
        state.light_script.clear();
        state.light_level = level;
    }

    /// Copy of the current device outputs
    #[cfg(test)]
    pub fn snapshot(&self) -> SimSnapshot {
        self.lock().outputs.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn write_led(&self, pwm: u8) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.lock();
        state.outputs.led_pwm = pwm;
        state.outputs.led_writes += 1;
    }
}

impl Default for SimulatedDrivers {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceDrivers for SimulatedDrivers {
    async fn set_led(&self, on: bool) -> Result<(), DriverError> {
        let pwm = if on { PWM_LED_FULL } else { PWM_LED_OFF };
        self.write_led(pwm).await;
        debug!("[SIM] LED pwm={}", pwm);
        Ok(())
    }

    async fn set_brightness(&self, level: Brightness) -> Result<(), DriverError> {
        let pwm = brightness_pwm(level);
        self.write_led(pwm).await;
        debug!("[SIM] LED brightness {:?} pwm={}", level, pwm);
        Ok(())
    }

    async fn play_melody(&self, melody: Melody) -> Result<(), DriverError> {
        self.stop_melody.store(false, Ordering::SeqCst);
        self.lock().outputs.melodies_started += 1;
        let note_duration = melody.tempo();

        for &note in melody.notes() {
            if self.stop_melody.load(Ordering::SeqCst) {
                let mut state = self.lock();
                state.outputs.tone_hz = 0.0;
                state.outputs.melodies_stopped += 1;
                debug!("[SIM] {} stopped early", melody);
                return Ok(());
            }
            self.lock().outputs.tone_hz = note;
            tokio::time::sleep(note_duration).await;
        }

        let mut state = self.lock();
        state.outputs.tone_hz = 0.0;
        state.outputs.melodies_completed += 1;
        debug!("[SIM] {} finished", melody);
        Ok(())
    }

    async fn stop_melody(&self) -> Result<(), DriverError> {
        self.stop_melody.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_brightness(&self) -> Result<LightLevel, DriverError> {
        let mut state = self.lock();
        state.outputs.light_reads += 1;
        if let Some(level) = state.light_script.pop_front() {
            state.light_level = level;
        }
        Ok(state.light_level)
    }

    async fn show_digit(&self, digit: u8) -> Result<(), DriverError> {
        if digit > 9 {
            return Err(DriverError::InvalidDigit(digit));
        }
        self.lock().outputs.digits_shown.push(digit);
        debug!("[SIM] Display {}", digit);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.stop_melody.store(true, Ordering::SeqCst);
        let mut state = self.lock();
        info!("[SIM] Releasing devices: {}", state.outputs);
        state.outputs.led_pwm = PWM_LED_OFF;
        state.outputs.tone_hz = 0.0;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
