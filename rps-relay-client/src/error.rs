//! Client errors.

/// Errors surfaced to the UI layer as inline status text.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// WebSocket connect or handshake failed.
    #[error("Failed to connect: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// No transport attached.
    #[error("Not connected to server")]
    NotConnected,

    /// Transport went away.
    #[error("Disconnected from server")]
    Closed,

    /// Outbound queue is full.
    #[error("Too many messages queued")]
    Backpressure,

    /// Join attempted with a blank code.
    #[error("Enter a join code.")]
    EmptyCode,

    /// Move submitted before anyone joined.
    #[error("Waiting for an opponent")]
    NoOpponent,

    /// Second move in the same round.
    #[error("Already chose this round, waiting for opponent")]
    AlreadySubmitted,

    /// Action not allowed in the current state.
    #[error("Cannot {0} right now")]
    InvalidState(&'static str),
}
