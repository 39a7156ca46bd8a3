//! Identifiers
//!
//! Room codes and participant handles are both short uppercase
//! alphanumeric strings produced by an injectable [`IdGenerator`].
//! Generation gives no uniqueness guarantee; the session store checks
//! room codes against live sessions before using them.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of generated codes and handles.
pub const ID_LEN: usize = 6;

/// Alphabet used by [`RandomIds`].
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// =============================================================================
// SESSION CODE
// =============================================================================

/// Room code shared between participants.
///
/// Always stored uppercase and trimmed, so lookups are case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Canonicalize a user-supplied code.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    /// Borrow the canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when nothing remains after trimming.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SessionCode {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for SessionCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PARTICIPANT ID
// =============================================================================

/// Opaque per-connection handle.
///
/// Implements Ord so round books resolve in a stable order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a handle string as-is.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(handle: &str) -> Self {
        Self::new(handle)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// GENERATORS
// =============================================================================

/// Source of short opaque identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce the next identifier. Not guaranteed unique.
    fn generate(&self) -> String;
}

/// Production generator: [`ID_LEN`] characters drawn from `A-Z0-9`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..ID_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Scripted generator that hands out a fixed list, wrapping around
/// when it reaches the end.
///
/// Used where identifiers must be predictable.
#[derive(Debug)]
pub struct CyclingIds {
    ids: Vec<String>,
    next: AtomicUsize,
}

impl CyclingIds {
    /// Create from a non-empty list. An empty list falls back to `"AAAAAA"`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            ids.push("A".repeat(ID_LEN));
        }
        Self { ids, next: AtomicUsize::new(0) }
    }
}

impl IdGenerator for CyclingIds {
    fn generate(&self) -> String {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.ids[i % self.ids.len()].clone()
    }
}
