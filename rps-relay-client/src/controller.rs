//! Client Session Controller
//!
//! Drives one participant's view of a room:
//!
//! ```text
//! Idle -> AwaitingServer(create|join) -> InSession(awaiting opponent | active)
//!      -> RoundPending -> RoundResolved -> RoundPending -> ...
//! ```
//!
//! The controller is transport-agnostic. Outbound messages go through an
//! attached [`Link`]; inbound messages are fed to [`SessionController::handle`].
//! Every handled message yields a [`SessionEvent`] whose `Display` text is
//! meant for an inline status line.

use std::fmt;

use tracing::{debug, info};

use rps_relay::game::{MatchWinner, RoundBook, RoundResult, Scoreboard, Verdict};
use rps_relay::{ClientMessage, Move, ParticipantId, ServerMessage, SessionCode};

use crate::client::Link;
use crate::error::ClientError;

/// Request waiting for the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    /// `create` sent.
    Create,
    /// `join` sent for this code.
    Join(SessionCode),
}

/// Whether the room has an opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Alone in the room.
    AwaitingOpponent,
    /// Both seats taken.
    Active,
}

/// Controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// No room.
    Idle,
    /// Create or join in flight.
    AwaitingServer(PendingRequest),
    /// In a room, no move recorded this round.
    InSession(Presence),
    /// At least one move recorded this round.
    RoundPending,
    /// Last round just resolved; ready for the next submission.
    RoundResolved,
}

/// Something the UI should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Room created, waiting for someone to join.
    Created {
        /// Code to share.
        code: SessionCode,
    },
    /// Joined an existing room.
    Joined {
        /// Room joined.
        code: SessionCode,
        /// Member already there.
        opponent: ParticipantId,
    },
    /// Someone joined our room.
    OpponentJoined {
        /// Newcomer.
        opponent: ParticipantId,
    },
    /// Opponent locked in a move; it stays hidden until the round resolves.
    OpponentMoved {
        /// Who moved.
        opponent: ParticipantId,
    },
    /// Both moves are in.
    RoundResolved {
        /// Both moves and the winner.
        result: RoundResult,
        /// The round from our side.
        verdict: Verdict,
        /// Set when this round decided the match.
        match_winner: Option<MatchWinner>,
    },
    /// Opponent disconnected.
    OpponentLeft {
        /// Who left.
        opponent: ParticipantId,
    },
    /// Server rejected a request.
    ServerError {
        /// Server's reason.
        message: String,
    },
    /// Transport closed.
    Disconnected,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Created { code } => write!(f, "Room created: {code}. Share this code."),
            SessionEvent::Joined { code, .. } => write!(f, "Joined room {code}."),
            SessionEvent::OpponentJoined { opponent } => write!(f, "Player joined: {opponent}"),
            SessionEvent::OpponentMoved { .. } => write!(f, "Opponent has chosen."),
            SessionEvent::RoundResolved { result, match_winner, .. } => match match_winner {
                Some(MatchWinner::Own) => write!(f, "{result}. You win the match!"),
                Some(MatchWinner::Opponent) => write!(f, "{result}. Opponent wins the match."),
                None => write!(f, "{result}"),
            },
            SessionEvent::OpponentLeft { opponent } => write!(f, "Player left: {opponent}"),
            SessionEvent::ServerError { message } => write!(f, "Error: {message}"),
            SessionEvent::Disconnected => write!(f, "Disconnected from server."),
        }
    }
}

/// Session-scoped client state plus the link it talks through.
pub struct SessionController {
    state: ControllerState,
    link: Option<Link>,
    code: Option<SessionCode>,
    me: Option<ParticipantId>,
    opponent: Option<ParticipantId>,
    round: RoundBook,
    last_result: Option<RoundResult>,
    score: Scoreboard,
}

impl SessionController {
    /// Create an idle controller. `target_wins` ends the match at N wins.
    pub fn new(target_wins: Option<u32>) -> Self {
        Self {
            state: ControllerState::Idle,
            link: None,
            code: None,
            me: None,
            opponent: None,
            round: RoundBook::new(),
            last_result: None,
            score: Scoreboard::new(target_wins),
        }
    }

    /// Attach the transport used for outbound messages.
    pub fn attach(&mut self, link: Link) {
        self.link = Some(link);
    }

    /// Whether a live link is attached.
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| !l.is_closed())
    }

    /// Current state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Room code, once the server assigned or confirmed one.
    pub fn code(&self) -> Option<&SessionCode> {
        self.code.as_ref()
    }

    /// Our handle.
    pub fn own_handle(&self) -> Option<&ParticipantId> {
        self.me.as_ref()
    }

    /// Opponent's handle.
    pub fn opponent(&self) -> Option<&ParticipantId> {
        self.opponent.as_ref()
    }

    /// Moves recorded for the round in progress.
    pub fn pending_moves(&self) -> usize {
        self.round.pending()
    }

    /// Most recent resolved round.
    pub fn last_result(&self) -> Option<&RoundResult> {
        self.last_result.as_ref()
    }

    /// Score in the current room.
    pub fn score(&self) -> &Scoreboard {
        &self.score
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Ask the server for a new room. Only allowed from `Idle`.
    pub fn create(&mut self) -> Result<(), ClientError> {
        if self.state != ControllerState::Idle {
            return Err(ClientError::InvalidState("create a room"));
        }
        self.send(ClientMessage::Create)?;
        self.clear_session();
        self.state = ControllerState::AwaitingServer(PendingRequest::Create);
        Ok(())
    }

    /// Ask to join room `code`. Only allowed from `Idle`; blank codes are
    /// rejected locally.
    pub fn join(&mut self, code: &str) -> Result<(), ClientError> {
        let code = SessionCode::new(code);
        if code.is_empty() {
            return Err(ClientError::EmptyCode);
        }
        if self.state != ControllerState::Idle {
            return Err(ClientError::InvalidState("join a room"));
        }
        self.send(ClientMessage::Join { code: code.clone() })?;
        self.clear_session();
        self.state = ControllerState::AwaitingServer(PendingRequest::Join(code));
        Ok(())
    }

    /// Submit our move for the current round.
    ///
    /// Returns the resolution event if the opponent had already moved.
    pub fn submit(&mut self, choice: Move) -> Result<Option<SessionEvent>, ClientError> {
        match self.state {
            ControllerState::InSession(Presence::Active)
            | ControllerState::RoundPending
            | ControllerState::RoundResolved => {}
            ControllerState::InSession(Presence::AwaitingOpponent) => {
                return Err(ClientError::NoOpponent)
            }
            _ => return Err(ClientError::InvalidState("choose a move")),
        }

        let (code, me) = match (&self.code, &self.me) {
            (Some(code), Some(me)) => (code.clone(), me.clone()),
            _ => return Err(ClientError::InvalidState("choose a move")),
        };
        if self.round.has_moved(&me) {
            return Err(ClientError::AlreadySubmitted);
        }

        self.send(ClientMessage::Move { code, choice })?;
        debug!("Submitted {}", choice);
        Ok(self.record(me, choice))
    }

    /// Leave the room: drop the connection and forget everything
    /// session-scoped.
    pub fn leave(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        self.reset();
    }

    /// Return every session-scoped field to its initial value.
    pub fn reset(&mut self) {
        self.clear_session();
        self.state = ControllerState::Idle;
    }

    /// The transport closed underneath us.
    pub fn connection_lost(&mut self) -> SessionEvent {
        info!("Connection to server lost");
        self.link = None;
        self.reset();
        SessionEvent::Disconnected
    }

    fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.link.as_ref().ok_or(ClientError::NotConnected)?.send(msg)
    }

    fn clear_session(&mut self) {
        self.code = None;
        self.me = None;
        self.opponent = None;
        self.round.clear();
        self.last_result = None;
        self.score.reset();
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// React to a server message. Returns `None` for messages that do not
    /// fit the current state.
    pub fn handle(&mut self, msg: ServerMessage) -> Option<SessionEvent> {
        match msg {
            ServerMessage::Created { code, participant_handle } => {
                if self.state != ControllerState::AwaitingServer(PendingRequest::Create) {
                    debug!("Ignoring unexpected created for {}", code);
                    return None;
                }
                self.code = Some(code.clone());
                self.me = Some(participant_handle);
                self.state = ControllerState::InSession(Presence::AwaitingOpponent);
                Some(SessionEvent::Created { code })
            }

            ServerMessage::Joined { code, participant_handle, opponent_handle } => {
                if !matches!(self.state, ControllerState::AwaitingServer(PendingRequest::Join(_))) {
                    debug!("Ignoring unexpected joined for {}", code);
                    return None;
                }
                self.code = Some(code.clone());
                self.me = Some(participant_handle);
                self.opponent = Some(opponent_handle.clone());
                self.state = ControllerState::InSession(Presence::Active);
                Some(SessionEvent::Joined { code, opponent: opponent_handle })
            }

            ServerMessage::PeerJoined { participant_handle } => {
                if self.code.is_none() {
                    return None;
                }
                self.opponent = Some(participant_handle.clone());
                if self.state == ControllerState::InSession(Presence::AwaitingOpponent) {
                    self.state = ControllerState::InSession(Presence::Active);
                }
                Some(SessionEvent::OpponentJoined { opponent: participant_handle })
            }

            ServerMessage::Move { participant_handle, choice } => {
                if self.code.is_none() {
                    return None;
                }
                if self.me.as_ref() == Some(&participant_handle) {
                    return None;
                }
                if self.opponent.is_none() {
                    self.opponent = Some(participant_handle.clone());
                }
                Some(self.record(participant_handle.clone(), choice).unwrap_or(
                    SessionEvent::OpponentMoved { opponent: participant_handle },
                ))
            }

            ServerMessage::PeerLeft { participant_handle } => {
                if self.opponent.as_ref() != Some(&participant_handle) {
                    return None;
                }
                self.opponent = None;
                self.round.clear();
                self.score.reset();
                self.state = ControllerState::InSession(Presence::AwaitingOpponent);
                Some(SessionEvent::OpponentLeft { opponent: participant_handle })
            }

            ServerMessage::Error { message } => {
                if matches!(self.state, ControllerState::AwaitingServer(_)) {
                    self.state = ControllerState::Idle;
                }
                Some(SessionEvent::ServerError { message })
            }
        }
    }

    /// Record a move; resolves the round once both sides are in.
    fn record(&mut self, who: ParticipantId, choice: Move) -> Option<SessionEvent> {
        let Some(result) = self.round.record(who, choice) else {
            self.state = ControllerState::RoundPending;
            return None;
        };

        let verdict = match &self.me {
            Some(me) => self.score.record(&result, me),
            None => Verdict::Draw,
        };
        let match_winner = self.score.match_winner();
        info!("Round resolved: {}", result);

        self.last_result = Some(result.clone());
        self.state = ControllerState::RoundResolved;
        Some(SessionEvent::RoundResolved { result, verdict, match_winner })
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn p(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn attached() -> (SessionController, mpsc::Receiver<ClientMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let mut controller = SessionController::new(None);
        controller.attach(Link::new(tx));
        (controller, rx)
    }

    /// Controller for P1 in room ABC123 with opponent P2.
    fn in_room() -> (SessionController, mpsc::Receiver<ClientMessage>) {
        let (mut c, mut rx) = attached();
        c.create().unwrap();
        c.handle(ServerMessage::Created { code: "ABC123".into(), participant_handle: p("P1") });
        c.handle(ServerMessage::PeerJoined { participant_handle: p("P2") });
        while rx.try_recv().is_ok() {}
        (c, rx)
    }

    #[test]
    fn test_create_flow() {
        let (mut c, mut rx) = attached();
        assert_eq!(c.state(), &ControllerState::Idle);

        c.create().unwrap();
        assert_eq!(rx.try_recv().unwrap(), ClientMessage::Create);
        assert_eq!(c.state(), &ControllerState::AwaitingServer(PendingRequest::Create));

        let event = c
            .handle(ServerMessage::Created { code: "ABC123".into(), participant_handle: p("P1") })
            .unwrap();
        assert_eq!(event.to_string(), "Room created: ABC123. Share this code.");
        assert_eq!(c.state(), &ControllerState::InSession(Presence::AwaitingOpponent));

        c.handle(ServerMessage::PeerJoined { participant_handle: p("P2") });
        assert_eq!(c.state(), &ControllerState::InSession(Presence::Active));
        assert_eq!(c.opponent(), Some(&p("P2")));
    }

    #[test]
    fn test_join_flow() {
        let (mut c, mut rx) = attached();
        c.join("  abc123 ").unwrap();
        assert_eq!(rx.try_recv().unwrap(), ClientMessage::Join { code: "ABC123".into() });

        let event = c.handle(ServerMessage::Joined {
            code: "ABC123".into(),
            participant_handle: p("P2"),
            opponent_handle: p("P1"),
        });
        assert_eq!(event, Some(SessionEvent::Joined { code: "ABC123".into(), opponent: p("P1") }));
        assert_eq!(c.state(), &ControllerState::InSession(Presence::Active));
        assert_eq!(c.own_handle(), Some(&p("P2")));
    }

    #[test]
    fn test_join_requires_code() {
        let (mut c, mut rx) = attached();
        assert!(matches!(c.join("   "), Err(ClientError::EmptyCode)));
        assert!(rx.try_recv().is_err());
        assert_eq!(c.state(), &ControllerState::Idle);
    }

    #[test]
    fn test_create_only_from_idle() {
        let (mut c, mut rx) = in_room();
        assert!(matches!(c.create(), Err(ClientError::InvalidState(_))));
        assert!(matches!(c.join("OTHER1"), Err(ClientError::InvalidState(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_join_error_returns_to_idle() {
        let (mut c, _rx) = attached();
        c.join("NOPE00").unwrap();
        let event = c.handle(ServerMessage::error("room not found")).unwrap();
        assert_eq!(event.to_string(), "Error: room not found");
        assert_eq!(c.state(), &ControllerState::Idle);
    }

    #[test]
    fn test_round_own_move_first() {
        let (mut c, mut rx) = in_room();

        assert_eq!(c.submit(Move::Rock).unwrap(), None);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::Move { code: "ABC123".into(), choice: Move::Rock }
        );
        assert_eq!(c.state(), &ControllerState::RoundPending);

        let event = c
            .handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Scissors })
            .unwrap();
        match &event {
            SessionEvent::RoundResolved { result, verdict, .. } => {
                assert_eq!(result.winner, Some(p("P1")));
                assert_eq!(*verdict, Verdict::Won);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(event.to_string(), "P1 wins: rock beats scissors");
        assert_eq!(c.state(), &ControllerState::RoundResolved);
        assert_eq!(c.pending_moves(), 0);
        assert_eq!(c.score().own, 1);
    }

    #[test]
    fn test_round_opponent_move_first() {
        let (mut c, _rx) = in_room();

        let event = c.handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Scissors });
        assert_eq!(event, Some(SessionEvent::OpponentMoved { opponent: p("P2") }));
        assert_eq!(c.state(), &ControllerState::RoundPending);

        let resolved = c.submit(Move::Rock).unwrap().unwrap();
        assert!(matches!(resolved, SessionEvent::RoundResolved { verdict: Verdict::Won, .. }));
        assert_eq!(c.pending_moves(), 0);
    }

    #[test]
    fn test_double_submit_rejected() {
        let (mut c, mut rx) = in_room();
        c.submit(Move::Paper).unwrap();
        rx.try_recv().unwrap();

        assert!(matches!(c.submit(Move::Rock), Err(ClientError::AlreadySubmitted)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_submit_without_opponent() {
        let (mut c, _rx) = attached();
        c.create().unwrap();
        c.handle(ServerMessage::Created { code: "ABC123".into(), participant_handle: p("P1") });
        assert!(matches!(c.submit(Move::Rock), Err(ClientError::NoOpponent)));
        assert!(matches!(
            SessionController::new(None).submit(Move::Rock),
            Err(ClientError::InvalidState(_))
        ));
    }

    #[test]
    fn test_next_round_after_resolution() {
        let (mut c, _rx) = in_room();
        c.submit(Move::Rock).unwrap();
        c.handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Rock });
        assert_eq!(c.state(), &ControllerState::RoundResolved);

        c.submit(Move::Paper).unwrap();
        assert_eq!(c.state(), &ControllerState::RoundPending);
        let event = c.handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Scissors });
        assert!(matches!(event, Some(SessionEvent::RoundResolved { verdict: Verdict::Lost, .. })));
        assert_eq!(c.score().draws, 1);
        assert_eq!(c.score().opponent, 1);
    }

    #[test]
    fn test_match_target() {
        let (tx, _rx) = mpsc::channel(16);
        let mut c = SessionController::new(Some(1));
        c.attach(Link::new(tx));
        c.create().unwrap();
        c.handle(ServerMessage::Created { code: "ABC123".into(), participant_handle: p("P1") });
        c.handle(ServerMessage::PeerJoined { participant_handle: p("P2") });

        c.submit(Move::Paper).unwrap();
        let event = c
            .handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Rock })
            .unwrap();
        assert!(matches!(
            event,
            SessionEvent::RoundResolved { match_winner: Some(MatchWinner::Own), .. }
        ));
        assert!(event.to_string().ends_with("You win the match!"));
    }

    #[test]
    fn test_peer_left_clears_round() {
        let (mut c, _rx) = in_room();
        c.handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Rock });
        assert_eq!(c.pending_moves(), 1);

        let event = c.handle(ServerMessage::PeerLeft { participant_handle: p("P2") });
        assert_eq!(event, Some(SessionEvent::OpponentLeft { opponent: p("P2") }));
        assert_eq!(c.pending_moves(), 0);
        assert_eq!(c.opponent(), None);
        assert_eq!(c.state(), &ControllerState::InSession(Presence::AwaitingOpponent));
        assert_eq!(c.code().map(SessionCode::as_str), Some("ABC123"));
    }

    #[test]
    fn test_server_error_keeps_session() {
        let (mut c, _rx) = in_room();
        let event = c.handle(ServerMessage::error("invalid move")).unwrap();
        assert_eq!(event, SessionEvent::ServerError { message: "invalid move".into() });
        assert_eq!(c.state(), &ControllerState::InSession(Presence::Active));
    }

    #[test]
    fn test_leave_resets_everything() {
        let (mut c, mut rx) = in_room();
        c.submit(Move::Rock).unwrap();
        rx.try_recv().unwrap();

        c.leave();
        assert_eq!(c.state(), &ControllerState::Idle);
        assert!(c.code().is_none());
        assert!(c.own_handle().is_none());
        assert!(c.opponent().is_none());
        assert_eq!(c.pending_moves(), 0);
        assert!(!c.is_connected());
        assert!(matches!(c.create(), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_connection_lost() {
        let (mut c, _rx) = in_room();
        assert_eq!(c.connection_lost(), SessionEvent::Disconnected);
        assert_eq!(c.state(), &ControllerState::Idle);
        assert!(c.code().is_none());
    }

    #[test]
    fn test_stray_messages_ignored() {
        let (mut c, _rx) = attached();
        assert!(c
            .handle(ServerMessage::Created { code: "ABC123".into(), participant_handle: p("P1") })
            .is_none());
        assert!(c
            .handle(ServerMessage::Move { participant_handle: p("P2"), choice: Move::Rock })
            .is_none());
        assert_eq!(c.state(), &ControllerState::Idle);
    }
}
