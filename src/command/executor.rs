//! Command executor - validates and dispatches queued commands

use super::bus::Request;
use super::handlers::{self, HandlerContext};
use crate::control::{Countdown, DeviceState, LoopEvent, SensorMonitor};
use crate::device::{DeviceDrivers, Melody};
use iot_shared::state_machine::LightTransition;
use iot_shared::{Command, CommandKind, CommandResponse};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Command completed successfully
    Completed { message: String, value: i32 },
    /// Command was valid but the device operation failed
    Failed { message: String },
    /// Command rejected (invalid parameter or state)
    Rejected { message: String },
    /// Answer now, then keep the loop busy with `follow_up`
    Pending {
        message: String,
        value: i32,
        follow_up: FollowUp,
    },
}

impl CommandResult {
    pub fn completed(message: impl Into<String>) -> Self {
        CommandResult::Completed {
            message: message.into(),
            value: 0,
        }
    }
}

/// Work that runs after a provisional response was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    PlayMelody(Melody),
}

/// Executes commands on the devices and owns the device state
pub struct CommandExecutor {
    drivers: Arc<dyn DeviceDrivers>,
    state: DeviceState,
    countdown: Countdown,
    sensor: SensorMonitor,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    state_tx: watch::Sender<DeviceState>,
    /// Bells started by finished countdowns
    bells: JoinSet<()>,
    bells_playing: usize,
    shutdown: watch::Receiver<bool>,
}

impl CommandExecutor {
    pub fn new(
        drivers: Arc<dyn DeviceDrivers>,
        events_tx: mpsc::UnboundedSender<LoopEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let state = DeviceState::default();
        let (state_tx, _) = watch::channel(state);
        Self {
            countdown: Countdown::new(drivers.clone(), events_tx.clone()),
            drivers,
            state,
            sensor: SensorMonitor::new(),
            events_tx,
            state_tx,
            bells: JoinSet::new(),
            bells_playing: 0,
            shutdown,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Receiver that sees every device state change
    pub fn subscribe_state(&self) -> watch::Receiver<DeviceState> {
        self.state_tx.subscribe()
    }

    pub fn drivers_name(&self) -> &'static str {
        self.drivers.name()
    }

    /// Execute a request and deliver its response
    pub async fn execute(&mut self, request: Request) {
        let Request { command, reply } = request;
        let start_time = Instant::now();

        info!(
            "[DEVICE] Executing {} (param1={}, param2={})",
            command.kind, command.param1, command.param2
        );

        let result = self.dispatch(&command).await;
        let elapsed = start_time.elapsed();

        match result {
            CommandResult::Completed { message, value } => {
                info!("[DEVICE] {} completed in {:?}: {}", command.kind, elapsed, message);
                deliver(reply, CommandResponse::success(message, value));
            }
            CommandResult::Failed { message } => {
                warn!("[DEVICE] {} failed: {}", command.kind, message);
                deliver(reply, CommandResponse::failure(message));
            }
            CommandResult::Rejected { message } => {
                info!("[DEVICE] {} rejected: {}", command.kind, message);
                deliver(reply, CommandResponse::failure(message));
            }
            CommandResult::Pending {
                message,
                value,
                follow_up,
            } => {
                info!("[DEVICE] {} accepted: {}", command.kind, message);
                deliver(reply, CommandResponse::success(message, value));
                self.publish();
                self.run_follow_up(follow_up).await;
            }
        }

        self.publish();
    }

    async fn dispatch(&mut self, command: &Command) -> CommandResult {
        let mut ctx = HandlerContext {
            drivers: self.drivers.as_ref(),
            state: &mut self.state,
            countdown: &mut self.countdown,
        };

        match command.kind {
            CommandKind::LedOn => handlers::handle_led_on(&mut ctx, command).await,
            CommandKind::LedOff => handlers::handle_led_off(&mut ctx, command).await,
            CommandKind::SetBrightness => handlers::handle_set_brightness(&mut ctx, command).await,
            CommandKind::BuzzerOn => handlers::handle_buzzer_on(&mut ctx, command).await,
            CommandKind::BuzzerOff => handlers::handle_buzzer_off(&mut ctx, command).await,
            CommandKind::SensorOn => handlers::handle_sensor_on(&mut ctx, command).await,
            CommandKind::SensorOff => handlers::handle_sensor_off(&mut ctx, command).await,
            CommandKind::SegmentDisplay => handlers::handle_segment_display(&mut ctx, command).await,
            CommandKind::SegmentStop => handlers::handle_segment_stop(&mut ctx, command).await,
            CommandKind::Exit => {
                info!("[DEVICE] Session closed");
                CommandResult::completed("Session closed")
            }
        }
    }

    async fn run_follow_up(&mut self, follow_up: FollowUp) {
        match follow_up {
            FollowUp::PlayMelody(melody) => {
                info!("[DEVICE] Playing {} ({:?})...", melody, melody.duration());
                let mut playback = self.drivers.play_melody(melody);
                let result = tokio::select! {
                    biased;
                    result = &mut playback => result,
                    _ = shutdown_requested(&mut self.shutdown) => {
                        info!("[DEVICE] Shutdown requested, stopping {}", melody);
                        if let Err(e) = self.drivers.stop_melody().await {
                            warn!("[DEVICE] Stopping melody failed: {}", e);
                        }
                        playback.await
                    }
                };
                if let Err(e) = result {
                    warn!("[DEVICE] Playback of {} failed: {}", melody, e);
                }
                self.state.buzzer_playing = false;
                info!("[DEVICE] Music playback completed");
            }
        }
    }

    /// Check the light sensor when monitoring is enabled
    pub async fn poll_sensor(&mut self) -> Option<LightTransition> {
        if !self.state.sensor_monitoring {
            return None;
        }
        let transition = self.sensor.poll(self.drivers.as_ref(), &mut self.state).await;
        if transition.is_some() {
            self.publish();
        }
        transition
    }

    pub fn sensor_monitoring(&self) -> bool {
        self.state.sensor_monitoring
    }

    /// Apply a notification from background device work
    pub async fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::CountdownFinished { generation } => {
                if !self.countdown.finish(generation) {
                    debug!("[DEVICE] Ignoring stale countdown #{}", generation);
                    return;
                }
                self.state.segment_counting = false;
                info!("[DEVICE] Countdown completed - playing {}", Melody::SchoolBell);
                self.start_bell();
            }
            LoopEvent::MelodyFinished => {
                while self.bells.try_join_next().is_some() {}
                self.bells_playing = self.bells_playing.saturating_sub(1);
                if self.bells_playing == 0 {
                    self.state.buzzer_playing = false;
                }
            }
        }
        self.publish();
    }

    fn start_bell(&mut self) {
        self.state.buzzer_playing = true;
        self.bells_playing += 1;
        let drivers = self.drivers.clone();
        let events = self.events_tx.clone();
        self.bells.spawn(async move {
            if let Err(e) = drivers.play_melody(Melody::SchoolBell).await {
                warn!("[DEVICE] Bell failed: {}", e);
            }
            let _ = events.send(LoopEvent::MelodyFinished);
        });
    }

    /// Stop background work and release the devices
    pub async fn shutdown(&mut self) {
        self.countdown.shutdown().await;
        if let Err(e) = self.drivers.shutdown().await {
            warn!("[DEVICE] Driver shutdown failed: {}", e);
        }
        while self.bells.join_next().await.is_some() {}
        self.bells_playing = 0;

        self.state.led_on = false;
        self.state.buzzer_playing = false;
        self.state.segment_counting = false;
        self.state.sensor_monitoring = false;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state);
    }
}

/// Resolves once shutdown is requested; never resolves if the bus is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stopping| *stopping).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn deliver(reply: oneshot::Sender<CommandResponse>, response: CommandResponse) {
    if reply.send(response).is_err() {
        debug!("[DEVICE] Response dropped, nobody is waiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDrivers;
    use std::time::Duration;

    fn executor() -> (
        CommandExecutor,
        Arc<SimulatedDrivers>,
        mpsc::UnboundedReceiver<LoopEvent>,
    ) {
        let drivers = Arc::new(SimulatedDrivers::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let (_, shutdown) = watch::channel(false);
        (CommandExecutor::new(drivers.clone(), tx, shutdown), drivers, rx)
    }

    fn request(command: Command) -> (Request, oneshot::Receiver<CommandResponse>) {
        let (reply, rx) = oneshot::channel();
        (Request { command, reply }, rx)
    }

    #[tokio::test]
    async fn test_exit_reaching_loop_closes_session() {
        let (mut executor, drivers, _events) = executor();
        let (req, rx) = request(Command::new(CommandKind::Exit));

        executor.execute(req).await;

        let response = rx.await.expect("response");
        assert!(response.is_success());
        assert_eq!(response.message, "Session closed");
        assert_eq!(drivers.snapshot().led_writes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buzzer_answers_before_playback() {
        let (mut executor, drivers, _events) = executor();
        let (req, mut rx) = request(Command::with_param(CommandKind::BuzzerOn, 99));
        let mut state = executor.subscribe_state();

        let exec = tokio::spawn(async move {
            executor.execute(req).await;
            executor
        });

        state.wait_for(|s| s.buzzer_playing).await.expect("state");
        let response = rx.try_recv().expect("provisional response");
        assert_eq!(response.message, "Playing music 1");
        assert_eq!(response.value, 1);
        assert_eq!(drivers.snapshot().melodies_completed, 0);

        let executor = exec.await.expect("join");
        assert!(!executor.state().buzzer_playing);
        assert_eq!(drivers.snapshot().melodies_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_completion_rings_bell() {
        let (mut executor, drivers, mut events) = executor();
        let (req, rx) = request(Command::with_param(CommandKind::SegmentDisplay, 2));
        executor.execute(req).await;
        assert!(rx.await.expect("response").is_success());
        assert!(executor.state().segment_counting);

        let event = events.recv().await.expect("countdown event");
        executor.handle_event(event).await;
        assert!(!executor.state().segment_counting);
        assert!(executor.state().buzzer_playing);

        let event = events.recv().await.expect("melody event");
        assert_eq!(event, LoopEvent::MelodyFinished);
        executor.handle_event(event).await;
        assert!(!executor.state().buzzer_playing);

        let snapshot = drivers.snapshot();
        assert_eq!(snapshot.digits_shown, vec![2, 1, 0]);
        assert_eq!(snapshot.melodies_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_countdown_event_ignored() {
        let (mut executor, _drivers, _events) = executor();
        let (req, _rx) = request(Command::with_param(CommandKind::SegmentDisplay, 9));
        executor.execute(req).await;

        executor
            .handle_event(LoopEvent::CountdownFinished { generation: 42 })
            .await;

        assert!(executor.state().segment_counting);
        assert!(!executor.state().buzzer_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_silences_devices() {
        let (mut executor, drivers, _events) = executor();
        let (req, _rx) = request(Command::new(CommandKind::LedOn));
        executor.execute(req).await;
        let (req, _rx) = request(Command::with_param(CommandKind::SegmentDisplay, 5));
        executor.execute(req).await;

        executor.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = drivers.snapshot();
        assert!(!snapshot.led_on());
        assert_eq!(snapshot.digits_shown, vec![5]);
        assert_eq!(executor.state(), DeviceState::default());
    }
}
