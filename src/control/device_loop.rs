use super::{DeviceState, LoopEvent};
use crate::command::{CommandBus, CommandExecutor, Request};
use crate::device::DeviceDrivers;
use iot_shared::state_machine::{LoopStateMachine, PhaseEvent, TransitionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The single consumer of the command queue
///
/// Executes one command at a time, polls the light sensor whenever the
/// queue stays empty for a poll interval, and applies countdown and bell
/// notifications in between.
pub struct DeviceControlLoop {
    bus: Arc<CommandBus>,
    executor: CommandExecutor,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    fsm: LoopStateMachine,
    poll_interval: Duration,
}

impl DeviceControlLoop {
    pub fn new(bus: Arc<CommandBus>, drivers: Arc<dyn DeviceDrivers>, poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            executor: CommandExecutor::new(drivers, events_tx, bus.subscribe_shutdown()),
            bus,
            events_rx,
            fsm: LoopStateMachine::new(),
            poll_interval,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DeviceState> {
        self.executor.subscribe_state()
    }

    /// Run until the bus is shut down; returns the final device state
    pub async fn run(mut self) -> DeviceState {
        info!(
            "[DEVICE] Control loop started ({} devices, poll every {:?})",
            self.executor.drivers_name(),
            self.poll_interval
        );

        let mut poll_timer = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.bus.is_running() {
            if let Some(request) = self.bus.pop() {
                self.dispatch(request).await;
                continue;
            }

            tokio::select! {
                _ = self.bus.wait_for_command() => {}
                Some(event) = self.events_rx.recv() => {
                    self.executor.handle_event(event).await;
                }
                _ = poll_timer.tick() => {
                    self.poll().await;
                }
            }
        }

        self.stop().await
    }

    async fn dispatch(&mut self, request: Request) {
        self.transition(PhaseEvent::CommandReady);
        self.executor.execute(request).await;
        self.transition(PhaseEvent::DispatchComplete);

        self.poll().await;
    }

    async fn poll(&mut self) {
        if !self.executor.sensor_monitoring() {
            return;
        }
        self.transition(PhaseEvent::PollTick);
        if let Some(transition) = self.executor.poll_sensor().await {
            debug!("[DEVICE] Light transition: {:?}", transition);
        }
        self.transition(PhaseEvent::PollComplete);
    }

    async fn stop(mut self) -> DeviceState {
        self.transition(PhaseEvent::StopRequested);

        let dropped = self.bus.drain();
        if !dropped.is_empty() {
            warn!("[DEVICE] Discarding {} pending commands", dropped.len());
        }
        drop(dropped);

        self.executor.shutdown().await;
        info!(
            "[DEVICE] Control loop stopped after {} commands, {} sensor polls",
            self.fsm.dispatched(),
            self.fsm.polls()
        );
        self.executor.state()
    }

    fn transition(&mut self, event: PhaseEvent) {
        match self.fsm.process_event(event) {
            TransitionResult::Success(phase) => {
                debug!("[DEVICE] {:?} -> {:?}", event, phase);
            }
            TransitionResult::Invalid { from, event } => {
                warn!("[DEVICE] Invalid loop transition: {:?} in {:?}", event, from);
            }
        }
    }
}
