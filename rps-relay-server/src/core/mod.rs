//! Core primitives.
//!
//! Identifier types and the generators that produce them.

pub mod ids;

pub use ids::{CyclingIds, IdGenerator, ParticipantId, RandomIds, SessionCode, ID_LEN};
