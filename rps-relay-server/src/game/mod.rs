//! Game Logic Module
//!
//! Pure round rules shared by server and client. No I/O.
//!
//! ## Module Structure
//!
//! - `rules`: Moves and the dominance cycle
//! - `round`: Pairing two submissions into a resolved round
//! - `score`: Running tally and match target

pub mod rules;
pub mod round;
pub mod score;

// Re-export key types
pub use rules::{decide, resolve, Move, Outcome, Resolution};
pub use round::{RoundBook, RoundResult, Verdict};
pub use score::{MatchWinner, Scoreboard};
