//! WebSocket Relay Server
//!
//! Async WebSocket server for room-based two-player sessions.
//! Each connection runs in its own task with a reader loop and a writer
//! task joined by a bounded outbound queue.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::{IdGenerator, RandomIds};
use crate::network::handler::ConnectionHandler;
use crate::network::protocol::{ProtocolError, ServerMessage};
use crate::network::session::{SessionStore, DEFAULT_MAX_CODE_ATTEMPTS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// Room code generation attempts before giving up.
    pub max_code_attempts: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            outbound_buffer: 64,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// `RPS_RELAY_ADDR` takes a full socket address; `PORT` alone binds
    /// every interface on that port.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env_parse::<SocketAddr>("RPS_RELAY_ADDR")
            .or_else(|| env_parse::<u16>("PORT").map(|port| SocketAddr::from(([0, 0, 0, 0], port))))
            .unwrap_or(defaults.bind_addr);

        Self {
            bind_addr,
            max_connections: env_parse("RPS_RELAY_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            outbound_buffer: env_parse("RPS_RELAY_OUTBOUND_BUFFER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.outbound_buffer),
            max_code_attempts: env_parse("RPS_RELAY_MAX_CODE_ATTEMPTS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_code_attempts),
            version: defaults.version,
        }
    }
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,
}

/// Releases a connection slot when dropped.
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Room registry shared by every connection.
    store: Arc<SessionStore>,
    /// Open connections.
    active: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a server with random room codes and handles.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_ids(config, Arc::new(RandomIds))
    }

    /// Create a server drawing identifiers from `ids`.
    pub fn with_ids(config: ServerConfig, ids: Arc<dyn IdGenerator>) -> Self {
        let store = Arc::new(SessionStore::new(ids, config.max_code_attempts));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            active: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// The room registry.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Open connections right now.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Sender that stops the server and closes every connection.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Bind the configured address and run until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), RelayServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), RelayServerError> {
        info!("Relay server v{} listening on {}", self.config.version, listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => match self.claim_slot() {
                            Ok(slot) => {
                                debug!("New connection from {}", addr);
                                self.handle_connection(stream, addr, slot);
                            }
                            Err(e) => warn!("{}, rejecting {}", e, addr),
                        },
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn claim_slot(&self) -> Result<ConnectionSlot, RelayServerError> {
        let claimed = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.config.max_connections).then_some(n + 1)
            });
        match claimed {
            Ok(_) => Ok(ConnectionSlot { active: self.active.clone() }),
            Err(_) => Err(RelayServerError::ConnectionLimitReached),
        }
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, slot: ConnectionSlot) {
        let store = self.store.clone();
        let outbound_buffer = self.config.outbound_buffer;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _slot = slot;

            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, RelayServerError::from(e));
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(outbound_buffer);
            let mut handler = ConnectionHandler::new(store, msg_tx).await;
            info!("{} connected as {}", addr, handler.participant());

            // Spawn message sender task
            let mut sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => handler.handle_text(&text).await,
                            Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                                Ok(text) => handler.handle_text(&text).await,
                                Err(_) => handler.reject(ProtocolError::InvalidJson).await,
                            },
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} closed the connection", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut sender_task => {
                        debug!("Writer for {} stopped", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            handler.disconnect().await;
            sender_task.abort();

            info!("Client {} ({}) cleaned up", addr, handler.participant());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.outbound_buffer > 0);
        assert_eq!(config.max_code_attempts, DEFAULT_MAX_CODE_ATTEMPTS);
    }

    #[test]
    fn test_connection_limit() {
        let config = ServerConfig { max_connections: 2, ..Default::default() };
        let server = RelayServer::new(config);

        let a = server.claim_slot().unwrap();
        let _b = server.claim_slot().unwrap();
        assert!(matches!(server.claim_slot(), Err(RelayServerError::ConnectionLimitReached)));
        assert_eq!(server.connection_count(), 2);

        drop(a);
        assert_eq!(server.connection_count(), 1);
        assert!(server.claim_slot().is_ok());
    }
}
