//! Individual operator session handling

use crate::command::{BusError, CommandBus};
use iot_shared::codec::{self, CodecError, LineDecoder};
use iot_shared::CommandKind;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Operator chose EXIT
    ClientExit,
    /// Connection closed by the peer
    PeerClosed,
    /// Server is shutting down
    ServerShutdown,
}

enum Input {
    Line(String),
    TooLong(usize),
    Closed,
    Shutdown,
}

/// Drives the menu protocol for one connected operator
pub struct SessionHandler<S> {
    stream: S,
    peer: String,
    bus: Arc<CommandBus>,
    shutdown: watch::Receiver<bool>,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
}

impl<S> SessionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>, bus: Arc<CommandBus>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            shutdown: bus.subscribe_shutdown(),
            bus,
            decoder: LineDecoder::new(),
            read_buf: vec![0u8; 1024],
        }
    }

    /// Serve the operator until they exit, disconnect or the server stops
    pub async fn run(mut self) -> io::Result<SessionEnd> {
        info!("[SESSION] {} connected", self.peer);
        self.send(codec::WELCOME).await?;

        loop {
            self.send(codec::MENU).await?;

            let line = match self.next_input().await? {
                Input::Line(line) => line,
                Input::TooLong(len) => {
                    warn!("[SESSION] {} sent a {} byte line", self.peer, len);
                    self.send(codec::INVALID_FORMAT).await?;
                    continue;
                }
                Input::Closed => return Ok(SessionEnd::PeerClosed),
                Input::Shutdown => return self.end_for_shutdown().await,
            };

            let mut command = match codec::parse_command_line(&line) {
                Ok(command) => command,
                Err(CodecError::UnknownCommand(code)) => {
                    debug!("[SESSION] Unknown command {} from {}", code, self.peer);
                    self.send(codec::UNKNOWN_COMMAND).await?;
                    continue;
                }
                Err(e) => {
                    debug!("[SESSION] {}", e);
                    self.send(codec::INVALID_FORMAT).await?;
                    continue;
                }
            };

            if command.kind == CommandKind::Exit {
                self.send(codec::GOODBYE).await?;
                return Ok(SessionEnd::ClientExit);
            }

            if command.param1 == 0 {
                if let Some(prompt) = codec::param_prompt(command.kind) {
                    self.send(prompt).await?;
                    command.param1 = match self.next_input().await? {
                        Input::Line(line) => codec::parse_param_line(&line),
                        Input::TooLong(_) => 0,
                        Input::Closed => return Ok(SessionEnd::PeerClosed),
                        Input::Shutdown => return self.end_for_shutdown().await,
                    };
                }
            }

            debug!("[SESSION] {} -> {}", self.peer, codec::encode_command(&command).trim_end());
            let reply = match self.bus.round_trip(command).await {
                Ok(response) => codec::encode_response(&response),
                Err(BusError::QueueFull) => {
                    warn!("[SESSION] Queue full, {} dropped", command.kind);
                    codec::QUEUE_FULL.to_string()
                }
                Err(BusError::Timeout) => {
                    warn!("[SESSION] {} timed out", command.kind);
                    codec::COMMAND_TIMEOUT.to_string()
                }
                Err(BusError::Closed) => return self.end_for_shutdown().await,
            };
            self.send(&reply).await?;
        }
    }

    async fn end_for_shutdown(&mut self) -> io::Result<SessionEnd> {
        // Best effort, the operator may already be gone
        let _ = self.send(codec::SHUTTING_DOWN).await;
        Ok(SessionEnd::ServerShutdown)
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        self.stream.write_all(text.as_bytes()).await?;
        self.stream.flush().await
    }

    async fn next_input(&mut self) -> io::Result<Input> {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(line)) => return Ok(Input::Line(line)),
                Ok(None) => {}
                Err(CodecError::LineTooLong(len)) => return Ok(Input::TooLong(len)),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }

            if *self.shutdown.borrow() {
                return Ok(Input::Shutdown);
            }

            tokio::select! {
                read = self.stream.read(&mut self.read_buf) => {
                    match read? {
                        0 => return Ok(Input::Closed),
                        n => self.decoder.extend(&self.read_buf[..n]),
                    }
                }
                _ = self.shutdown.changed() => {}
            }
        }
    }
}
