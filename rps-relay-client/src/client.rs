//! WebSocket client for connecting to the relay server

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use rps_relay::{ClientMessage, Move, ServerMessage};

use crate::controller::{SessionController, SessionEvent};
use crate::error::ClientError;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay server URL.
    pub url: String,
    /// Capacity of the outbound queue.
    pub outbound_buffer: usize,
    /// Capacity of the inbound queue.
    pub inbound_buffer: usize,
    /// Wins needed to take a match. `None` plays forever.
    pub target_wins: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            outbound_buffer: 100,
            inbound_buffer: 100,
            target_wins: None,
        }
    }
}

impl ClientConfig {
    /// Default config pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    /// Default config, with the URL taken from `RPS_RELAY_URL` when set.
    pub fn from_env() -> Self {
        match std::env::var("RPS_RELAY_URL") {
            Ok(url) if !url.trim().is_empty() => Self::with_url(url.trim()),
            _ => Self::default(),
        }
    }
}

/// Outbound half of a connection. Dropping it tears the connection down.
pub struct Link {
    sender: mpsc::Sender<ClientMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    /// Wrap a bare channel, with no socket tasks behind it.
    pub fn new(sender: mpsc::Sender<ClientMessage>) -> Self {
        Self { sender, tasks: Vec::new() }
    }

    /// Queue a message without waiting.
    pub fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::Backpressure,
            TrySendError::Closed(_) => ClientError::Closed,
        })
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Close the connection.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Open a WebSocket to `config.url`.
///
/// Returns the outbound [`Link`] and a queue of parsed server messages.
/// The queue ends when the server closes the connection.
pub async fn connect(
    config: &ClientConfig,
) -> Result<(Link, mpsc::Receiver<ServerMessage>), ClientError> {
    info!("Connecting to {}...", config.url);
    let (ws_stream, _) = connect_async(config.url.as_str()).await?;
    info!("WebSocket connected!");

    let (mut write, mut read) = ws_stream.split();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ClientMessage>(config.outbound_buffer);
    let (incoming_tx, incoming_rx) = mpsc::channel::<ServerMessage>(config.inbound_buffer);

    // Reader task
    let reader = tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                    Ok(server_msg) => {
                        debug!("Received: {:?}", server_msg);
                        if incoming_tx.send(server_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse server message: {} - {}", e, text);
                    }
                },
                Ok(Message::Close(_)) => {
                    info!("Server closed connection");
                    break;
                }
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        debug!("Reader task ended");
    });

    // Writer task
    let writer = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            let json = match msg.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            debug!("Sending: {}", json);
            if let Err(e) = write.send(Message::Text(json)).await {
                error!("Failed to send message: {}", e);
                break;
            }
        }
        let _ = write.close().await;
        debug!("Writer task ended");
    });

    let link = Link { sender: outgoing_tx, tasks: vec![reader, writer] };
    Ok((link, incoming_rx))
}

/// Session controller bundled with its WebSocket transport.
pub struct RelayClient {
    config: ClientConfig,
    controller: SessionController,
    inbound: Option<mpsc::Receiver<ServerMessage>>,
}

impl RelayClient {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let controller = SessionController::new(config.target_wins);
        Self { config, controller, inbound: None }
    }

    /// The session state machine.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Connect unless a live connection already exists.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.controller.is_connected() && self.inbound.is_some() {
            return Ok(());
        }
        let (link, inbound) = connect(&self.config).await?;
        self.controller.attach(link);
        self.inbound = Some(inbound);
        Ok(())
    }

    /// Connect if needed and ask for a new room.
    pub async fn create(&mut self) -> Result<(), ClientError> {
        self.connect().await?;
        self.controller.create()
    }

    /// Connect if needed and join room `code`.
    pub async fn join(&mut self, code: &str) -> Result<(), ClientError> {
        if code.trim().is_empty() {
            return Err(ClientError::EmptyCode);
        }
        self.connect().await?;
        self.controller.join(code)
    }

    /// Submit a move for the current round.
    pub fn submit(&mut self, choice: Move) -> Result<Option<SessionEvent>, ClientError> {
        self.controller.submit(choice)
    }

    /// Wait for the next event worth showing.
    ///
    /// Yields [`SessionEvent::Disconnected`] once when the connection drops,
    /// then `None` until reconnected.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let inbound = self.inbound.as_mut()?;
            match inbound.recv().await {
                Some(msg) => {
                    if let Some(event) = self.controller.handle(msg) {
                        return Some(event);
                    }
                }
                None => {
                    self.inbound = None;
                    return Some(self.controller.connection_lost());
                }
            }
        }
    }

    /// Leave the room and close the connection.
    pub fn leave(&mut self) {
        self.controller.leave();
        self.inbound = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_backpressure() {
        let (tx, _rx) = mpsc::channel(1);
        let link = Link::new(tx);
        link.send(ClientMessage::Create).unwrap();
        assert!(matches!(link.send(ClientMessage::Create), Err(ClientError::Backpressure)));
    }

    #[test]
    fn test_link_closed() {
        let (tx, rx) = mpsc::channel(4);
        let link = Link::new(tx);
        assert!(!link.is_closed());
        drop(rx);
        assert!(link.is_closed());
        assert!(matches!(link.send(ClientMessage::Create), Err(ClientError::Closed)));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:8080");
        assert!(config.target_wins.is_none());
        assert_eq!(ClientConfig::with_url("ws://example:9").url, "ws://example:9");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = ClientConfig::with_url("ws://127.0.0.1:1");
        assert!(matches!(connect(&config).await, Err(ClientError::Connect(_))));
    }

    #[tokio::test]
    async fn test_join_blank_code_skips_connect() {
        let mut client = RelayClient::new(ClientConfig::with_url("ws://127.0.0.1:1"));
        assert!(matches!(client.join("  ").await, Err(ClientError::EmptyCode)));
        assert!(!client.controller().is_connected());
        assert!(client.next_event().await.is_none());
    }
}
