//! # RPS Relay Server
//!
//! Pairs two remote players into a room identified by a short shareable
//! code and relays their rock-paper-scissors moves to each other.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RPS RELAY SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  └── ids.rs      - Room codes, handles, id generators        │
//! │                                                              │
//! │  game/           - Round logic (pure)                        │
//! │  ├── rules.rs    - Moves and resolution                      │
//! │  ├── round.rs    - Pairing two submissions                   │
//! │  └── score.rs    - Scoreboard                                │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── handler.rs  - Per-connection protocol logic             │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Room registry                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The server never pairs or judges moves. Each client resolves rounds
//! locally with [`game::RoundBook`] once it holds both submissions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::ids::{ParticipantId, SessionCode};
pub use crate::game::rules::{Move, Outcome, Resolution};
pub use crate::network::protocol::{ClientMessage, ServerMessage};
pub use crate::network::server::{RelayServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
