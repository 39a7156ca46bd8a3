//! Session Store
//!
//! Process-wide registry of rooms and their members. One instance is
//! constructed per server and shared with every connection behind an `Arc`.
//!
//! A single mutex guards both the room map and the member index, and every
//! operation does its check-then-mutate under one acquisition. Two joins
//! racing for the last slot therefore cannot both succeed, and two creates
//! cannot claim the same fresh code.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::core::ids::{IdGenerator, ParticipantId, RandomIds, SessionCode};
use crate::network::protocol::ServerMessage;

/// Members per room.
pub const ROOM_CAPACITY: usize = 2;

/// Default bound on code generation retries.
pub const DEFAULT_MAX_CODE_ATTEMPTS: usize = 16;

// =============================================================================
// MEMBERS AND ROOMS
// =============================================================================

/// A participant as seen by the store: its handle and a way to reach it.
///
/// The store holds a clone of the sender; the channel itself belongs to the
/// connection task.
#[derive(Debug, Clone)]
pub struct Member {
    /// Participant handle.
    pub handle: ParticipantId,
    /// Outbound queue of the participant's connection.
    pub outbound: mpsc::Sender<ServerMessage>,
}

impl Member {
    /// Create a member record.
    pub fn new(handle: ParticipantId, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { handle, outbound }
    }

    /// Enqueue a message without waiting.
    ///
    /// A full or closed queue means the peer is unreachable.
    pub fn notify(&self, message: ServerMessage) -> Result<(), SessionError> {
        self.outbound
            .try_send(message)
            .map_err(|_| SessionError::PeerUnreachable(self.handle.clone()))
    }
}

/// A room with two member slots.
#[derive(Debug)]
pub struct Session {
    /// Room code.
    pub code: SessionCode,
    slots: [Option<Member>; ROOM_CAPACITY],
}

impl Session {
    /// Create a room holding only its creator.
    pub fn new(code: SessionCode, creator: Member) -> Self {
        Self { code, slots: [Some(creator), None] }
    }

    /// Members in join order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.slots.iter().flatten()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.members().count()
    }

    /// True when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// True when every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Whether `handle` occupies a slot.
    pub fn contains(&self, handle: &ParticipantId) -> bool {
        self.members().any(|m| &m.handle == handle)
    }

    /// Members other than `handle`.
    pub fn others(&self, handle: &ParticipantId) -> Vec<Member> {
        self.members().filter(|m| &m.handle != handle).cloned().collect()
    }

    /// Place a member in the first free slot.
    fn admit(&mut self, member: Member) -> Result<(), SessionError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(SessionError::RoomFull)?;
        *slot = Some(member);
        Ok(())
    }

    /// Vacate the slot held by `handle`, keeping the remaining member first.
    fn evict(&mut self, handle: &ParticipantId) -> Option<Member> {
        let index = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|m| &m.handle == handle))?;
        let removed = self.slots[index].take();
        self.slots.sort_by_key(|s| s.is_none());
        removed
    }
}

// =============================================================================
// RESULTS AND ERRORS
// =============================================================================

/// A participant leaving a room, with everyone who must hear about it.
#[derive(Debug)]
pub struct Departure {
    /// Room that was left.
    pub code: SessionCode,
    /// Who left.
    pub handle: ParticipantId,
    /// Members still in the room.
    pub remaining: Vec<Member>,
    /// True when the room became empty and was deleted.
    pub closed: bool,
}

/// Result of a successful create.
#[derive(Debug)]
pub struct CreatedSession {
    /// Code of the new room.
    pub code: SessionCode,
    /// Room the creator was moved out of, if any.
    pub previous: Option<Departure>,
}

/// Result of a successful join.
#[derive(Debug)]
pub struct JoinedSession {
    /// Room joined.
    pub code: SessionCode,
    /// Member that was already waiting.
    pub opponent: Member,
    /// Room the joiner was moved out of, if any.
    pub previous: Option<Departure>,
}

/// Session errors.
///
/// The `Display` text is what the client sees in `error{message}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No room with that code.
    #[error("room not found")]
    NotFound,

    /// Room already has two members.
    #[error("room full")]
    RoomFull,

    /// Joiner is already a member of the room.
    #[error("already in room")]
    AlreadyInRoom,

    /// Code generation kept colliding.
    #[error("no free room code")]
    CapacityExhausted,

    /// Peer's outbound queue is full or closed.
    #[error("peer {0} unreachable")]
    PeerUnreachable(ParticipantId),
}

// =============================================================================
// SESSION STORE
// =============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    /// Active rooms.
    sessions: BTreeMap<SessionCode, Session>,
    /// Participant to room mapping.
    memberships: BTreeMap<ParticipantId, SessionCode>,
    /// Handles held by open connections.
    live: BTreeSet<ParticipantId>,
}

impl StoreInner {
    fn detach(&mut self, handle: &ParticipantId) -> Option<Departure> {
        let code = self.memberships.remove(handle)?;
        let session = self.sessions.get_mut(&code)?;
        session.evict(handle)?;

        let remaining = session.members().cloned().collect();
        let closed = session.is_empty();
        if closed {
            self.sessions.remove(&code);
        }

        Some(Departure { code, handle: handle.clone(), remaining, closed })
    }
}

/// Owns every active room.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    ids: Arc<dyn IdGenerator>,
    max_code_attempts: usize,
}

impl SessionStore {
    /// Create a store drawing identifiers from `ids`.
    pub fn new(ids: Arc<dyn IdGenerator>, max_code_attempts: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            ids,
            max_code_attempts: max_code_attempts.max(1),
        }
    }

    /// Reserve a handle for a new connection, unique among open connections.
    ///
    /// Draws up to `max_code_attempts` identifiers; if every one is taken,
    /// the last draw gets a numeric suffix.
    pub async fn next_handle(&self) -> ParticipantId {
        let mut inner = self.inner.lock().await;

        let mut last = String::new();
        for _ in 0..self.max_code_attempts {
            let raw = self.ids.generate();
            let handle = ParticipantId::new(raw.as_str());
            if inner.live.insert(handle.clone()) {
                return handle;
            }
            last = raw;
        }

        let mut n = 2;
        loop {
            let handle = ParticipantId::new(format!("{last}-{n}"));
            if inner.live.insert(handle.clone()) {
                debug!("Handle space crowded, assigned {}", handle);
                return handle;
            }
            n += 1;
        }
    }

    /// Give a closed connection's handle back.
    pub async fn release_handle(&self, handle: &ParticipantId) {
        self.inner.lock().await.live.remove(handle);
    }

    /// Open a room with `creator` as its only member.
    ///
    /// If the creator was in another room it leaves it first, atomically.
    pub async fn create_session(&self, creator: Member) -> Result<CreatedSession, SessionError> {
        let mut inner = self.inner.lock().await;

        let code = (0..self.max_code_attempts)
            .map(|_| SessionCode::new(&self.ids.generate()))
            .find(|code| !code.is_empty() && !inner.sessions.contains_key(code))
            .ok_or(SessionError::CapacityExhausted)?;

        let previous = inner.detach(&creator.handle);
        inner.memberships.insert(creator.handle.clone(), code.clone());
        inner.sessions.insert(code.clone(), Session::new(code.clone(), creator));

        debug!("Room {} created ({} active)", code, inner.sessions.len());
        Ok(CreatedSession { code, previous })
    }

    /// Add `joiner` to the room `code`.
    ///
    /// Nothing changes on failure. On success the joiner leaves any other
    /// room it was in, in the same critical section.
    pub async fn join_session(
        &self,
        code: &SessionCode,
        joiner: Member,
    ) -> Result<JoinedSession, SessionError> {
        let mut inner = self.inner.lock().await;

        let session = inner.sessions.get(code).ok_or(SessionError::NotFound)?;
        if session.contains(&joiner.handle) {
            return Err(SessionError::AlreadyInRoom);
        }
        if session.is_full() {
            return Err(SessionError::RoomFull);
        }

        let previous = inner.detach(&joiner.handle);

        let session = inner.sessions.get_mut(code).ok_or(SessionError::NotFound)?;
        let opponent = session
            .members()
            .next()
            .cloned()
            .ok_or(SessionError::NotFound)?;
        let handle = joiner.handle.clone();
        session.admit(joiner)?;
        inner.memberships.insert(handle, code.clone());

        Ok(JoinedSession { code: code.clone(), opponent, previous })
    }

    /// Take `handle` out of whatever room it is in.
    ///
    /// Deletes the room when it empties. Returns `None` if the participant
    /// was in no room, so repeated calls are harmless.
    pub async fn remove_participant(&self, handle: &ParticipantId) -> Option<Departure> {
        let departure = self.inner.lock().await.detach(handle);
        if let Some(d) = &departure {
            debug!("{} left room {} (closed: {})", d.handle, d.code, d.closed);
        }
        departure
    }

    /// Members of `code` other than `excluding`.
    ///
    /// Fails with `NotFound` when the room is unknown or `excluding` is not
    /// one of its members.
    pub async fn broadcast_targets(
        &self,
        code: &SessionCode,
        excluding: &ParticipantId,
    ) -> Result<Vec<Member>, SessionError> {
        let inner = self.inner.lock().await;
        match inner.sessions.get(code) {
            Some(session) if session.contains(excluding) => Ok(session.others(excluding)),
            _ => Err(SessionError::NotFound),
        }
    }

    /// Number of active rooms.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Handles in room `code`, in join order.
    pub async fn members(&self, code: &SessionCode) -> Option<Vec<ParticipantId>> {
        let inner = self.inner.lock().await;
        inner
            .sessions
            .get(code)
            .map(|s| s.members().map(|m| m.handle.clone()).collect())
    }

    /// Room currently holding `handle`.
    pub async fn session_of(&self, handle: &ParticipantId) -> Option<SessionCode> {
        self.inner.lock().await.memberships.get(handle).cloned()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(RandomIds), DEFAULT_MAX_CODE_ATTEMPTS)
    }
}
