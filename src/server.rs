//! Process wiring: devices, command bus, control loop and listener

use crate::command::CommandBus;
use crate::config::ServerConfig;
use crate::control::{DeviceControlLoop, DeviceState};
use crate::device::{self, DeviceDrivers};
use crate::session::Listener;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A running server
pub struct Server {
    bus: Arc<CommandBus>,
    local_addr: SocketAddr,
    loop_task: JoinHandle<DeviceState>,
    listener_task: JoinHandle<()>,
}

impl Server {
    /// Initialize the configured devices and start serving
    pub async fn start(config: &ServerConfig) -> Result<Self> {
        let drivers = device::build_drivers(config).context("failed to initialize devices")?;
        Self::start_with_drivers(config, drivers).await
    }

    pub async fn start_with_drivers(config: &ServerConfig, drivers: Arc<dyn DeviceDrivers>) -> Result<Self> {
        info!("[SERVER] Devices ready ({})", drivers.name());

        let bus = Arc::new(CommandBus::new(config.queue_capacity, config.response_timeout));
        let listener = Listener::bind(config.listen_addr, bus.clone())
            .await
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        let local_addr = listener.local_addr()?;

        let device_loop = DeviceControlLoop::new(bus.clone(), drivers, config.poll_interval);
        tokio::spawn(log_state_changes(device_loop.subscribe_state()));

        let loop_task = tokio::spawn(device_loop.run());
        let listener_task = tokio::spawn(listener.run());

        Ok(Self {
            bus,
            local_addr,
            loop_task,
            listener_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let the loop drain and release the devices
    pub async fn shutdown(self) -> Result<DeviceState> {
        info!("[SERVER] Shutting down");
        self.bus.shutdown();

        let (final_state, listener) = tokio::join!(self.loop_task, self.listener_task);
        listener.context("listener task failed")?;
        let final_state = final_state.context("device loop task failed")?;

        info!("[SERVER] Shutdown complete");
        Ok(final_state)
    }
}

/// Serve until Ctrl-C or SIGTERM
pub async fn run(config: ServerConfig) -> Result<()> {
    let server = Server::start(&config).await?;
    info!("[SERVER] Ready on {}", server.local_addr());

    wait_for_signal().await?;
    server.shutdown().await?;
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("[SERVER] Interrupt received");
        }
        _ = terminate.recv() => {
            info!("[SERVER] SIGTERM received");
        }
    }
    Ok(())
}

async fn log_state_changes(mut state: watch::Receiver<DeviceState>) {
    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        debug!("[SERVER] Device state: {:?}", current);
    }
}
