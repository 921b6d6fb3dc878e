//! Accept loop with single-operator admission

use super::handler::SessionHandler;
use crate::command::CommandBus;
use iot_shared::codec;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Clears the active-session flag when the session task ends
struct ActiveSession(Arc<AtomicBool>);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Listener {
    listener: TcpListener,
    bus: Arc<CommandBus>,
    active: Arc<AtomicBool>,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, bus: Arc<CommandBus>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            bus,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept operators until shutdown, then wait for the open session to end
    pub async fn run(self) {
        let mut shutdown = self.bus.subscribe_shutdown();
        let mut sessions = JoinSet::new();

        match self.local_addr() {
            Ok(addr) => info!("[SERVER] Listening on {}", addr),
            Err(e) => warn!("[SERVER] Listening on unknown address: {}", e),
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("[SERVER] Accept failed: {}", e);
                            continue;
                        }
                    };
                    while sessions.try_join_next().is_some() {}

                    if self.active.swap(true, Ordering::SeqCst) {
                        reject(stream, peer).await;
                        continue;
                    }

                    let guard = ActiveSession(self.active.clone());
                    let bus = self.bus.clone();
                    sessions.spawn(async move {
                        let _guard = guard;
                        let handler = SessionHandler::new(stream, peer.to_string(), bus);
                        match handler.run().await {
                            Ok(end) => info!("[SESSION] {} disconnected ({:?})", peer, end),
                            Err(e) => warn!("[SESSION] {} dropped: {}", peer, e),
                        }
                    });
                }
                _ = shutdown.changed() => {}
            }
        }

        info!("[SERVER] No longer accepting connections");
        while sessions.join_next().await.is_some() {}
    }
}

async fn reject(mut stream: TcpStream, peer: SocketAddr) {
    info!("[SERVER] Rejected {}: another operator is connected", peer);
    if let Err(e) = stream.write_all(codec::BUSY.as_bytes()).await {
        warn!("[SERVER] Could not notify {}: {}", peer, e);
    }
    let _ = stream.shutdown().await;
}
