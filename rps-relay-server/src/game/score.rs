//! Scoreboard
//!
//! Running tally of resolved rounds from one participant's side, with an
//! optional "first to N wins" target.

use crate::core::ids::ParticipantId;
use crate::game::round::{RoundResult, Verdict};

/// Which side finished the match first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchWinner {
    /// The local participant reached the target.
    Own,
    /// The opponent reached the target.
    Opponent,
}

/// Round tally for the local participant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scoreboard {
    /// Rounds won by the local participant.
    pub own: u32,
    /// Rounds won by the opponent.
    pub opponent: u32,
    /// Drawn rounds.
    pub draws: u32,
    /// Wins needed to take the match. `None` plays forever.
    pub target: Option<u32>,
}

impl Scoreboard {
    /// Create an empty board with an optional win target.
    pub fn new(target: Option<u32>) -> Self {
        Self { target, ..Self::default() }
    }

    /// Count a resolved round as seen by `me`.
    pub fn record(&mut self, result: &RoundResult, me: &ParticipantId) -> Verdict {
        let verdict = result.verdict_for(me);
        match verdict {
            Verdict::Won => self.own += 1,
            Verdict::Lost => self.opponent += 1,
            Verdict::Draw => self.draws += 1,
        }
        verdict
    }

    /// Rounds played so far.
    pub fn rounds(&self) -> u32 {
        self.own + self.opponent + self.draws
    }

    /// Winner of the match once either side hits the target.
    pub fn match_winner(&self) -> Option<MatchWinner> {
        let target = self.target?;
        if self.own >= target {
            Some(MatchWinner::Own)
        } else if self.opponent >= target {
            Some(MatchWinner::Opponent)
        } else {
            None
        }
    }

    /// Zero the tally, keeping the target.
    pub fn reset(&mut self) {
        *self = Self::new(self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::round::RoundBook;
    use crate::game::rules::Move;

    fn play(book: &mut RoundBook, mine: Move, theirs: Move) -> RoundResult {
        book.record(ParticipantId::new("ME"), mine);
        book.record(ParticipantId::new("YOU"), theirs).unwrap()
    }

    #[test]
    fn test_tally_and_target() {
        let me = ParticipantId::new("ME");
        let mut book = RoundBook::new();
        let mut board = Scoreboard::new(Some(2));

        board.record(&play(&mut book, Move::Rock, Move::Scissors), &me);
        board.record(&play(&mut book, Move::Rock, Move::Rock), &me);
        board.record(&play(&mut book, Move::Rock, Move::Paper), &me);
        assert_eq!((board.own, board.opponent, board.draws), (1, 1, 1));
        assert_eq!(board.match_winner(), None);

        let verdict = board.record(&play(&mut book, Move::Paper, Move::Rock), &me);
        assert_eq!(verdict, Verdict::Won);
        assert_eq!(board.match_winner(), Some(MatchWinner::Own));
        assert_eq!(board.rounds(), 4);
    }

    #[test]
    fn test_no_target_never_finishes() {
        let me = ParticipantId::new("ME");
        let mut book = RoundBook::new();
        let mut board = Scoreboard::new(None);
        for _ in 0..10 {
            board.record(&play(&mut book, Move::Scissors, Move::Paper), &me);
        }
        assert_eq!(board.match_winner(), None);
    }

    #[test]
    fn test_reset_keeps_target() {
        let mut board = Scoreboard::new(Some(3));
        board.own = 2;
        board.draws = 1;
        board.reset();
        assert_eq!(board, Scoreboard::new(Some(3)));
    }
}
