//! Connection Handler
//!
//! Per-connection protocol logic, independent of the socket. The server
//! feeds it inbound text frames and drains its outbound queue; tests drive
//! it the same way over in-memory channels.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::ids::{ParticipantId, SessionCode};
use crate::game::rules::Move;
use crate::network::protocol::{ClientMessage, ProtocolError, ServerMessage};
use crate::network::session::{Departure, Member, SessionError, SessionStore};

/// Protocol state for one connected participant.
pub struct ConnectionHandler {
    /// Handle assigned when the connection opened.
    handle: ParticipantId,
    /// Room this connection believes it is in.
    room: Option<SessionCode>,
    /// Queue drained by the connection's writer task.
    outbound: mpsc::Sender<ServerMessage>,
    /// Shared room registry.
    store: Arc<SessionStore>,
    /// Set once disconnect cleanup ran.
    closed: bool,
}

impl ConnectionHandler {
    /// Create a handler with a handle no other live connection holds.
    pub async fn new(store: Arc<SessionStore>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        let handle = store.next_handle().await;
        Self { handle, room: None, outbound, store, closed: false }
    }

    /// This connection's participant handle.
    pub fn participant(&self) -> &ParticipantId {
        &self.handle
    }

    /// Room recorded on this connection, if any.
    pub fn room(&self) -> Option<&SessionCode> {
        self.room.as_ref()
    }

    /// Handle one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientMessage::parse(text) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => self.reject(e).await,
        }
    }

    /// Reply to a frame that failed to parse.
    pub async fn reject(&self, error: ProtocolError) {
        if let ProtocolError::Malformed(detail) = &error {
            debug!("Malformed message from {}: {}", self.handle, detail);
        } else {
            debug!("Rejected message from {}: {}", self.handle, error);
        }
        self.reply(ServerMessage::error(&error)).await;
    }

    /// Dispatch a parsed message. Errors go back to the sender only.
    pub async fn handle_message(&mut self, msg: ClientMessage) {
        if self.closed {
            return;
        }

        let result = match msg {
            ClientMessage::Create => self.handle_create().await,
            ClientMessage::Join { code } => self.handle_join(code).await,
            ClientMessage::Move { code, choice } => self.handle_move(code, choice).await,
        };

        if let Err(e) = result {
            debug!("Request from {} failed: {}", self.handle, e);
            self.reply(ServerMessage::error(&e)).await;
        }
    }

    async fn handle_create(&mut self) -> Result<(), SessionError> {
        let created = self.store.create_session(self.member()).await?;
        if let Some(previous) = created.previous {
            self.announce(previous).await;
        }

        info!("{} created room {}", self.handle, created.code);
        self.room = Some(created.code.clone());
        self.reply(ServerMessage::Created {
            code: created.code,
            participant_handle: self.handle.clone(),
        })
        .await;
        Ok(())
    }

    async fn handle_join(&mut self, code: SessionCode) -> Result<(), SessionError> {
        if code.is_empty() {
            return Err(SessionError::NotFound);
        }

        let joined = self.store.join_session(&code, self.member()).await?;
        if let Some(previous) = joined.previous {
            self.announce(previous).await;
        }

        info!("{} joined room {} with {}", self.handle, joined.code, joined.opponent.handle);
        self.room = Some(joined.code.clone());
        self.reply(ServerMessage::Joined {
            code: joined.code,
            participant_handle: self.handle.clone(),
            opponent_handle: joined.opponent.handle.clone(),
        })
        .await;

        let notice = ServerMessage::PeerJoined { participant_handle: self.handle.clone() };
        self.deliver(&joined.opponent, notice).await;
        Ok(())
    }

    async fn handle_move(&mut self, code: SessionCode, choice: Move) -> Result<(), SessionError> {
        if self.room.as_ref() != Some(&code) {
            return Err(SessionError::NotFound);
        }
        let targets = match self.store.broadcast_targets(&code, &self.handle).await {
            Ok(targets) => targets,
            Err(e) => {
                // A peer evicted us; the recorded room is stale
                self.room = None;
                return Err(e);
            }
        };

        debug!("{} moved in room {} ({} recipients)", self.handle, code, targets.len());
        for target in &targets {
            let relay = ServerMessage::Move {
                participant_handle: self.handle.clone(),
                choice,
            };
            self.deliver(target, relay).await;
        }
        Ok(())
    }

    /// Run disconnect cleanup. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.room = None;

        if let Some(departure) = self.store.remove_participant(&self.handle).await {
            info!("{} disconnected from room {}", self.handle, departure.code);
            self.announce(departure).await;
        }
        self.store.release_handle(&self.handle).await;
    }

    fn member(&self) -> Member {
        Member::new(self.handle.clone(), self.outbound.clone())
    }

    async fn reply(&self, msg: ServerMessage) {
        if self.outbound.send(msg).await.is_err() {
            debug!("Outbound queue for {} closed", self.handle);
        }
    }

    /// Send to a peer; an unreachable peer is treated as disconnected.
    async fn deliver(&self, target: &Member, msg: ServerMessage) {
        if let Err(e) = target.notify(msg) {
            warn!("{}, dropping it from its room", e);
            if let Some(departure) = self.store.remove_participant(&target.handle).await {
                self.announce(departure).await;
            }
        }
    }

    /// Tell the members left behind that someone is gone.
    ///
    /// A member that cannot be told is dropped from its room as well, and
    /// that departure is announced in turn.
    async fn announce(&self, departure: Departure) {
        let mut pending = vec![departure];
        while let Some(departure) = pending.pop() {
            if departure.closed {
                debug!("Room {} closed", departure.code);
            }
            for member in &departure.remaining {
                let notice = ServerMessage::PeerLeft {
                    participant_handle: departure.handle.clone(),
                };
                if let Err(e) = member.notify(notice) {
                    warn!("{}, dropping it from its room", e);
                    if let Some(next) = self.store.remove_participant(&member.handle).await {
                        pending.push(next);
                    }
                }
            }
        }
    }
}
