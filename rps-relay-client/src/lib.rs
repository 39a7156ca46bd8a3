//! # RPS Relay Client
//!
//! Client side of the relay: a session state machine that turns server
//! messages into UI events and pairs both players' moves into a round
//! result, plus the WebSocket transport that feeds it.
//!
//! Rendering is left to the caller; every [`SessionEvent`] implements
//! `Display` with the status line to show.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod client;
pub mod controller;
pub mod error;

pub use client::{connect, ClientConfig, Link, RelayClient};
pub use controller::{ControllerState, PendingRequest, Presence, SessionController, SessionEvent};
pub use error::ClientError;
