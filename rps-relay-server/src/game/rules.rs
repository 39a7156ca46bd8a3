//! Round Rules
//!
//! The three legal moves and the cyclic dominance between them.
//! Everything here is pure: no I/O, no randomness, no clocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// MOVE
// =============================================================================

/// A move a participant can submit for a round.
///
/// Serialized as the lowercase name (`"rock"`, `"paper"`, `"scissors"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    /// Beats scissors.
    Rock,
    /// Beats rock.
    Paper,
    /// Beats paper.
    Scissors,
}

impl Move {
    /// All legal moves, in wire order.
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// The move this one defeats.
    pub const fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Scissors => Move::Paper,
            Move::Paper => Move::Rock,
        }
    }

    /// Wire name of the move.
    pub const fn as_str(self) -> &'static str {
        match self {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the three legal moves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid move: {0:?}")]
pub struct InvalidMove(pub String);

impl FromStr for Move {
    type Err = InvalidMove;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            other => Err(InvalidMove(other.to_string())),
        }
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Result of a decided round, seen from the first argument's side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Both moves were equal.
    Draw,
    /// The first move won.
    WinA,
    /// The second move won.
    WinB,
}

impl Outcome {
    /// Outcome with the two sides swapped. Draws stay draws.
    pub const fn inverse(self) -> Outcome {
        match self {
            Outcome::Draw => Outcome::Draw,
            Outcome::WinA => Outcome::WinB,
            Outcome::WinB => Outcome::WinA,
        }
    }
}

/// Resolution status for a round that may still be missing a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// At least one side has not submitted yet.
    Pending,
    /// Both moves present.
    Decided(Outcome),
}

/// Decide a round between two present moves.
pub fn decide(a: Move, b: Move) -> Outcome {
    if a == b {
        Outcome::Draw
    } else if a.beats() == b {
        Outcome::WinA
    } else {
        Outcome::WinB
    }
}

/// Resolve a round, short-circuiting to [`Resolution::Pending`] while
/// either move is missing.
pub fn resolve(a: Option<Move>, b: Option<Move>) -> Resolution {
    match (a, b) {
        (Some(a), Some(b)) => Resolution::Decided(decide(a, b)),
        _ => Resolution::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_move() -> impl Strategy<Value = Move> {
        prop::sample::select(Move::ALL.to_vec())
    }

    #[test]
    fn test_dominance_cycle() {
        assert_eq!(decide(Move::Rock, Move::Scissors), Outcome::WinA);
        assert_eq!(decide(Move::Scissors, Move::Paper), Outcome::WinA);
        assert_eq!(decide(Move::Paper, Move::Rock), Outcome::WinA);

        assert_eq!(decide(Move::Scissors, Move::Rock), Outcome::WinB);
        assert_eq!(decide(Move::Paper, Move::Scissors), Outcome::WinB);
        assert_eq!(decide(Move::Rock, Move::Paper), Outcome::WinB);
    }

    #[test]
    fn test_equal_moves_draw() {
        for mv in Move::ALL {
            assert_eq!(decide(mv, mv), Outcome::Draw);
        }
    }

    #[test]
    fn test_missing_move_is_pending() {
        assert_eq!(resolve(None, None), Resolution::Pending);
        assert_eq!(resolve(Some(Move::Rock), None), Resolution::Pending);
        assert_eq!(resolve(None, Some(Move::Paper)), Resolution::Pending);
        assert_eq!(
            resolve(Some(Move::Rock), Some(Move::Scissors)),
            Resolution::Decided(Outcome::WinA)
        );
    }

    #[test]
    fn test_move_parsing() {
        assert_eq!("rock".parse::<Move>(), Ok(Move::Rock));
        assert_eq!("scissors".parse::<Move>(), Ok(Move::Scissors));
        assert!("lizard".parse::<Move>().is_err());
        // Wire values are case-sensitive
        assert!("Rock".parse::<Move>().is_err());
    }

    #[test]
    fn test_move_json() {
        let json = serde_json::to_string(&Move::Paper).unwrap();
        assert_eq!(json, "\"paper\"");
        assert!(serde_json::from_str::<Move>("\"spock\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_swapped_arguments_invert(a in any_move(), b in any_move()) {
            prop_assert_eq!(decide(a, b), decide(b, a).inverse());
        }

        #[test]
        fn prop_display_parses_back(mv in any_move()) {
            prop_assert_eq!(mv.to_string().parse::<Move>(), Ok(mv));
        }
    }
}
