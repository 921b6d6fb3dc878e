//! Seven-segment countdown timer
//!
//! Counts down one digit per second on the display. Stopping is
//! cooperative: the ticker checks its stop flag before every digit. When the
//! count reaches 0 the control loop is told with
//! [`LoopEvent::CountdownFinished`].

use super::LoopEvent;
use crate::device::{DeviceDrivers, DriverError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TICK: Duration = Duration::from_secs(1);

struct ActiveCountdown {
    generation: u64,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct Countdown {
    drivers: Arc<dyn DeviceDrivers>,
    events: mpsc::UnboundedSender<LoopEvent>,
    active: Option<ActiveCountdown>,
    generation: u64,
}

impl Countdown {
    pub fn new(drivers: Arc<dyn DeviceDrivers>, events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self {
            drivers,
            events,
            active: None,
            generation: 0,
        }
    }

    /// Show `seconds` and start ticking towards 0
    ///
    /// Fails if the display rejects the first digit; nothing is started then.
    /// Returns the generation number the completion event will carry.
    pub async fn start(&mut self, seconds: u8) -> Result<u64, DriverError> {
        self.stop();
        self.drivers.show_digit(seconds).await?;

        self.generation += 1;
        let generation = self.generation;
        let stop = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(tick(
            self.drivers.clone(),
            seconds,
            stop.clone(),
            generation,
            self.events.clone(),
        ));

        self.active = Some(ActiveCountdown {
            generation,
            stop,
            handle,
        });
        Ok(generation)
    }

    /// Ask a running countdown to stop; returns false if none was running
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.stop.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Accept a completion event; stale generations are ignored
    pub fn finish(&mut self, generation: u64) -> bool {
        match &self.active {
            Some(active) if active.generation == generation => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Stop the ticker and wait for its task to end
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.store(true, Ordering::SeqCst);
            active.handle.abort();
            let _ = active.handle.await;
        }
    }
}

async fn tick(
    drivers: Arc<dyn DeviceDrivers>,
    seconds: u8,
    stop: Arc<AtomicBool>,
    generation: u64,
    events: mpsc::UnboundedSender<LoopEvent>,
) {
    for digit in (0..seconds).rev() {
        tokio::time::sleep(TICK).await;
        if stop.load(Ordering::SeqCst) {
            debug!("[DEVICE] Countdown #{} stopped", generation);
            return;
        }
        if let Err(e) = drivers.show_digit(digit).await {
            warn!("[DEVICE] Display write failed: {}", e);
        }
    }

    if !stop.load(Ordering::SeqCst) {
        let _ = events.send(LoopEvent::CountdownFinished { generation });
    }
}
