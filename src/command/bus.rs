//! Request/response hand-off between sessions and the device control loop
//!
//! Sessions submit commands into the bounded queue and wait on a private
//! reply channel; the loop pops one request at a time and answers on that
//! channel. A reply can therefore never reach the wrong waiter.

use super::queue::CommandQueue;
use iot_shared::{Command, CommandResponse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, watch, Notify};
use tracing::debug;

/// A queued command together with the channel its response goes to
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<CommandResponse>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("command queue full")]
    QueueFull,

    #[error("no response within the deadline")]
    Timeout,

    #[error("device loop is shutting down")]
    Closed,
}

pub struct CommandBus {
    queue: Mutex<CommandQueue<Request>>,
    /// Signalled whenever a request is queued, and on shutdown
    ready: Notify,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    response_timeout: Duration,
}

impl CommandBus {
    pub fn new(capacity: usize, response_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue: Mutex::new(CommandQueue::new(capacity)),
            ready: Notify::new(),
            running: AtomicBool::new(true),
            shutdown_tx,
            response_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CommandQueue<Request>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a command and return the receiver its response will arrive on
    pub fn submit(&self, command: Command) -> Result<oneshot::Receiver<CommandResponse>, BusError> {
        if !self.is_running() {
            return Err(BusError::Closed);
        }

        let (reply, rx) = oneshot::channel();
        let pending = {
            let mut queue = self.lock();
            if !queue.push(Request { command, reply }) {
                return Err(BusError::QueueFull);
            }
            queue.len()
        };

        debug!("Queued {} ({} pending)", command.kind, pending);
        self.ready.notify_one();
        Ok(rx)
    }

    /// Submit a command and wait for its response
    ///
    /// On timeout the command stays queued (or in flight) and may still run;
    /// its response is then discarded.
    pub async fn round_trip(&self, command: Command) -> Result<CommandResponse, BusError> {
        let rx = self.submit(command)?;
        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BusError::Closed),
            Err(_) => {
                debug!("{} timed out after {:?}", command.kind, self.response_timeout);
                Err(BusError::Timeout)
            }
        }
    }

    /// Take the oldest queued request
    pub fn pop(&self) -> Option<Request> {
        self.lock().pop()
    }

    /// Wait until a request may be available or shutdown was requested
    ///
    /// Wakeups can be spurious; callers re-check with [`CommandBus::pop`].
    pub async fn wait_for_command(&self) {
        self.ready.notified().await;
    }

    /// Remove all pending requests
    pub fn drain(&self) -> Vec<Request> {
        self.lock().drain()
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the keep-running flag and wake everything that waits on the bus
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.ready.notify_waiters();
        self.ready.notify_one();
        self.shutdown_tx.send_replace(true);
    }

    /// Receiver that flips to `true` once shutdown is requested
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}
