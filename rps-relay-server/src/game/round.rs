//! Round Pairing
//!
//! Collects the moves submitted for the current round, keyed by the
//! submitting participant, and resolves as soon as two distinct
//! participants have moved. Resolution works on the set of entries
//! (ordered by handle), never on arrival order.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::ids::ParticipantId;
use crate::game::rules::{decide, Move, Outcome};

/// How a resolved round went for one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// This participant won.
    Won,
    /// This participant lost.
    Lost,
    /// Nobody won.
    Draw,
}

/// A fully resolved round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    /// Both submissions, ordered by handle.
    pub moves: [(ParticipantId, Move); 2],
    /// Winning participant, `None` on a draw.
    pub winner: Option<ParticipantId>,
}

impl RoundResult {
    fn from_pair(first: (ParticipantId, Move), second: (ParticipantId, Move)) -> Self {
        let winner = match decide(first.1, second.1) {
            Outcome::Draw => None,
            Outcome::WinA => Some(first.0.clone()),
            Outcome::WinB => Some(second.0.clone()),
        };
        Self { moves: [first, second], winner }
    }

    /// Move submitted by `who`, if they took part.
    pub fn move_of(&self, who: &ParticipantId) -> Option<Move> {
        self.moves.iter().find(|(id, _)| id == who).map(|(_, mv)| *mv)
    }

    /// The round from `who`'s point of view.
    pub fn verdict_for(&self, who: &ParticipantId) -> Verdict {
        match &self.winner {
            None => Verdict::Draw,
            Some(winner) if winner == who => Verdict::Won,
            Some(_) => Verdict::Lost,
        }
    }
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [(a, a_move), (b, b_move)] = &self.moves;
        match &self.winner {
            None => write!(f, "Both chose {a_move}. Draw."),
            Some(w) if w == a => write!(f, "{a} wins: {a_move} beats {b_move}"),
            Some(_) => write!(f, "{b} wins: {b_move} beats {a_move}"),
        }
    }
}

/// Pending moves for the round in progress.
#[derive(Clone, Debug, Default)]
pub struct RoundBook {
    moves: BTreeMap<ParticipantId, Move>,
}

impl RoundBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `who`'s move. A repeat submission from the same participant
    /// replaces their earlier one.
    ///
    /// Returns the result once two distinct participants have moved; the
    /// book is empty again after that.
    pub fn record(&mut self, who: ParticipantId, mv: Move) -> Option<RoundResult> {
        self.moves.insert(who, mv);
        if self.moves.len() < 2 {
            return None;
        }

        let mut entries = std::mem::take(&mut self.moves).into_iter();
        let first = entries.next()?;
        let second = entries.next()?;
        Some(RoundResult::from_pair(first, second))
    }

    /// Whether `who` already has a move recorded this round.
    pub fn has_moved(&self, who: &ParticipantId) -> bool {
        self.moves.contains_key(who)
    }

    /// Number of moves waiting for a partner.
    pub fn pending(&self) -> usize {
        self.moves.len()
    }

    /// True when no move is recorded.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Drop every recorded move.
    pub fn clear(&mut self) {
        self.moves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    #[test]
    fn test_single_move_waits() {
        let mut book = RoundBook::new();
        assert!(book.record(p("P1"), Move::Rock).is_none());
        assert_eq!(book.pending(), 1);
        assert!(book.has_moved(&p("P1")));
        assert!(!book.has_moved(&p("P2")));
    }

    #[test]
    fn test_two_moves_resolve_and_clear() {
        let mut book = RoundBook::new();
        book.record(p("P1"), Move::Rock);
        let result = book.record(p("P2"), Move::Scissors).unwrap();

        assert_eq!(result.winner, Some(p("P1")));
        assert_eq!(result.verdict_for(&p("P1")), Verdict::Won);
        assert_eq!(result.verdict_for(&p("P2")), Verdict::Lost);
        assert_eq!(result.move_of(&p("P2")), Some(Move::Scissors));
        assert!(book.is_empty());
    }

    #[test]
    fn test_order_independent() {
        for a in Move::ALL {
            for b in Move::ALL {
                let mut forward = RoundBook::new();
                forward.record(p("P1"), a);
                let r1 = forward.record(p("P2"), b).unwrap();

                let mut backward = RoundBook::new();
                backward.record(p("P2"), b);
                let r2 = backward.record(p("P1"), a).unwrap();

                assert_eq!(r1, r2);
                assert!(forward.is_empty());
                assert!(backward.is_empty());
            }
        }
    }

    #[test]
    fn test_same_participant_does_not_pair_with_itself() {
        let mut book = RoundBook::new();
        assert!(book.record(p("P1"), Move::Rock).is_none());
        assert!(book.record(p("P1"), Move::Paper).is_none());
        assert_eq!(book.pending(), 1);

        let result = book.record(p("P2"), Move::Rock).unwrap();
        assert_eq!(result.move_of(&p("P1")), Some(Move::Paper));
    }

    #[test]
    fn test_no_stale_moves_between_rounds() {
        let mut book = RoundBook::new();
        book.record(p("P1"), Move::Rock);
        book.record(p("P2"), Move::Rock).unwrap();

        // Next round starts from nothing
        assert!(book.record(p("P2"), Move::Paper).is_none());
        let result = book.record(p("P1"), Move::Scissors).unwrap();
        assert_eq!(result.winner, Some(p("P1")));
    }

    #[test]
    fn test_display() {
        let mut book = RoundBook::new();
        book.record(p("P1"), Move::Rock);
        let result = book.record(p("P2"), Move::Scissors).unwrap();
        assert_eq!(result.to_string(), "P1 wins: rock beats scissors");

        book.record(p("P1"), Move::Paper);
        let draw = book.record(p("P2"), Move::Paper).unwrap();
        assert_eq!(draw.to_string(), "Both chose paper. Draw.");
        assert_eq!(draw.verdict_for(&p("P1")), Verdict::Draw);
    }
}
