//! Network Layer
//!
//! WebSocket transport, wire protocol and the room registry.
//! Round resolution never happens here; the server only relays moves.

pub mod handler;
pub mod protocol;
pub mod session;
pub mod server;

pub use handler::ConnectionHandler;
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use session::{Member, Session, SessionError, SessionStore};
pub use server::{RelayServer, RelayServerError, ServerConfig};
