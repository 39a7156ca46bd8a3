//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a UTF-8 JSON object with a `type` discriminator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ids::{ParticipantId, SessionCode};
use crate::game::rules::Move;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Open a new room with the sender as its first member.
    Create,

    /// Enter an existing room.
    Join {
        /// Room to join.
        #[serde(alias = "room")]
        code: SessionCode,
    },

    /// Submit a move for the current round.
    Move {
        /// Room the move belongs to.
        #[serde(alias = "room")]
        code: SessionCode,
        /// The move itself.
        #[serde(rename = "move")]
        choice: Move,
    },
}

/// Why an inbound frame was rejected at the parse boundary.
///
/// The `Display` text is what the client sees in `error{message}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not JSON.
    #[error("invalid json")]
    InvalidJson,

    /// `type` missing or not one of the known kinds.
    #[error("unknown message type")]
    UnknownType,

    /// Known kind but a required field is missing or mistyped.
    #[error("malformed message")]
    Malformed(String),

    /// `move` is not rock, paper or scissors.
    #[error("invalid move")]
    InvalidMove(String),
}

impl ClientMessage {
    /// Wire names of every kind the server understands.
    pub const KINDS: [&'static str; 3] = ["create", "join", "move"];

    /// Parse and validate an inbound frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidJson)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::UnknownType)?;
        if !Self::KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownType);
        }

        // Reject out-of-range moves before the generic structural check so
        // the client learns which field was wrong.
        if kind == "move" {
            if let Some(raw) = value.get("move").and_then(Value::as_str) {
                raw.parse::<Move>()
                    .map_err(|e| ProtocolError::InvalidMove(e.0))?;
            }
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Room created; the sender is its only member.
    #[serde(rename_all = "camelCase")]
    Created {
        /// Code to share with the opponent.
        #[serde(alias = "room")]
        code: SessionCode,
        /// The creator's own handle.
        #[serde(alias = "playerId")]
        participant_handle: ParticipantId,
    },

    /// Sent to a participant that just joined.
    #[serde(rename_all = "camelCase")]
    Joined {
        /// Room joined.
        #[serde(alias = "room")]
        code: SessionCode,
        /// The joiner's own handle.
        #[serde(alias = "playerId")]
        participant_handle: ParticipantId,
        /// Handle of the member already in the room.
        #[serde(alias = "opponent")]
        opponent_handle: ParticipantId,
    },

    /// Sent to the existing member when someone joins.
    #[serde(rename_all = "camelCase")]
    PeerJoined {
        /// Handle of the newcomer.
        #[serde(alias = "playerId")]
        participant_handle: ParticipantId,
    },

    /// A move relayed from the other member.
    #[serde(rename_all = "camelCase")]
    Move {
        /// Who moved.
        #[serde(alias = "player")]
        participant_handle: ParticipantId,
        /// What they chose.
        #[serde(rename = "move")]
        choice: Move,
    },

    /// The other member disconnected.
    #[serde(rename_all = "camelCase")]
    PeerLeft {
        /// Handle of the member that left.
        #[serde(alias = "playerId")]
        participant_handle: ParticipantId,
    },

    /// Request rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerMessage {
    /// Build an error reply from anything displayable.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        ServerMessage::Error { message: reason.to_string() }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
