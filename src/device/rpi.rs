//! Raspberry Pi GPIO backend
//!
//! LED and buzzer use software PWM, the light sensor is a plain digital input
//! (low = bright) and the display is driven through a 4-bit BCD decoder.

use super::{brightness_pwm, DeviceDrivers, DriverError, LightLevel, Melody, PWM_LED_FULL, PWM_LED_OFF, PWM_RANGE};
use crate::config::PinConfig;
use async_trait::async_trait;
use iot_shared::Brightness;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const LED_PWM_FREQUENCY: f64 = 1000.0;
const BUZZER_DUTY_CYCLE: f64 = 0.5;

/// BCD bit patterns for digits 0-9, least significant bit first
const BCD_VALUES: [[bool; 4]; 10] = [
    [false, false, false, false],
    [true, false, false, false],
    [false, true, false, false],
    [true, true, false, false],
    [false, false, true, false],
    [true, false, true, false],
    [false, true, true, false],
    [true, true, true, false],
    [false, false, false, true],
    [true, false, false, true],
];

impl From<rppal::gpio::Error> for DriverError {
    fn from(err: rppal::gpio::Error) -> Self {
        DriverError::Gpio(err.to_string())
    }
}

pub struct RpiDrivers {
    led: Mutex<OutputPin>,
    buzzer: Mutex<OutputPin>,
    sensor: Mutex<InputPin>,
    segment: Mutex<[OutputPin; 4]>,
    stop_melody: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RpiDrivers {
    /// Claim all configured pins and put the devices in their idle state
    pub fn new(pins: &PinConfig) -> Result<Self, DriverError> {
        let gpio = Gpio::new()?;

        let mut led = gpio.get(pins.led)?.into_output();
        led.set_pwm_frequency(LED_PWM_FREQUENCY, duty_cycle(PWM_LED_OFF))?;

        let mut buzzer = gpio.get(pins.buzzer)?.into_output();
        buzzer.set_low();

        let sensor = gpio.get(pins.sensor)?.into_input();

        let [a, b, c, d] = pins.segment;
        let segment = [
            gpio.get(a)?.into_output_low(),
            gpio.get(b)?.into_output_low(),
            gpio.get(c)?.into_output_low(),
            gpio.get(d)?.into_output_low(),
        ];

        info!(
            "[DEVICE] GPIO ready (led={}, sensor={}, buzzer={}, segment={:?})",
            pins.led, pins.sensor, pins.buzzer, pins.segment
        );

        Ok(Self {
            led: Mutex::new(led),
            buzzer: Mutex::new(buzzer),
            sensor: Mutex::new(sensor),
            segment: Mutex::new(segment),
            stop_melody: AtomicBool::new(false),
        })
    }

    fn write_led(&self, pwm: u8) -> Result<(), DriverError> {
        lock(&self.led).set_pwm_frequency(LED_PWM_FREQUENCY, duty_cycle(pwm))?;
        Ok(())
    }

    fn tone(&self, frequency: f64) -> Result<(), DriverError> {
        let mut buzzer = lock(&self.buzzer);
        if frequency > 0.0 {
            buzzer.set_pwm_frequency(frequency, BUZZER_DUTY_CYCLE)?;
        } else {
            buzzer.clear_pwm()?;
            buzzer.set_low();
        }
        Ok(())
    }
}

fn duty_cycle(pwm: u8) -> f64 {
    f64::from(pwm) / f64::from(PWM_RANGE)
}

#[async_trait]
impl DeviceDrivers for RpiDrivers {
    async fn set_led(&self, on: bool) -> Result<(), DriverError> {
        self.write_led(if on { PWM_LED_FULL } else { PWM_LED_OFF })
    }

    async fn set_brightness(&self, level: Brightness) -> Result<(), DriverError> {
        self.write_led(brightness_pwm(level))
    }

    async fn play_melody(&self, melody: Melody) -> Result<(), DriverError> {
        self.stop_melody.store(false, Ordering::SeqCst);
        debug!("[DEVICE] Playing {}", melody);

        for &note in melody.notes() {
            if self.stop_melody.load(Ordering::SeqCst) {
                debug!("[DEVICE] {} stopped", melody);
                break;
            }
            self.tone(note)?;
            tokio::time::sleep(melody.tempo()).await;
        }

        self.tone(0.0)
    }

    async fn stop_melody(&self) -> Result<(), DriverError> {
        self.stop_melody.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_brightness(&self) -> Result<LightLevel, DriverError> {
        Ok(match lock(&self.sensor).read() {
            Level::Low => LightLevel::Bright,
            Level::High => LightLevel::Dark,
        })
    }

    async fn show_digit(&self, digit: u8) -> Result<(), DriverError> {
        let bits = BCD_VALUES
            .get(usize::from(digit))
            .ok_or(DriverError::InvalidDigit(digit))?;

        let mut segment = lock(&self.segment);
        for (pin, &high) in segment.iter_mut().zip(bits) {
            pin.write(if high { Level::High } else { Level::Low });
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.stop_melody.store(true, Ordering::SeqCst);
        self.tone(0.0)?;
        self.write_led(PWM_LED_OFF)?;
        for pin in lock(&self.segment).iter_mut() {
            pin.set_low();
        }
        info!("[DEVICE] GPIO released");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rpi"
    }
}
