//! Error taxonomy for the session engine.
//!
//! Phase/eligibility rejections are reported to the caller and change nothing.
//! Version conflicts are retried internally and only surface as `Contention`
//! once the retry budget is spent. Invariant violations are never silently
//! ignored; the engine logs them and recomputes from the authoritative player
//! list instead of trusting accumulated state.

use crate::store::StoreError;
use crate::types::{PlayerId, SessionStatus};

/// Result type for coordinator operations
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("session not found")]
    SessionNotFound,

    #[error("player not found in this session")]
    PlayerNotFound,

    #[error("operation requires status {expected:?}, session is {actual:?}")]
    WrongStatus {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("it is {expected}'s turn to speak")]
    OutOfTurn { expected: PlayerId },

    #[error("player already gave a clue this round")]
    AlreadySpoken,

    #[error("eliminated players cannot act")]
    Eliminated,

    #[error("player already voted in this ballot")]
    AlreadyVoted,

    #[error("players cannot vote for themselves")]
    SelfVote,

    #[error("vote target is not an active player of this session")]
    InvalidTarget,

    #[error("session is full")]
    SessionFull,

    #[error("need at least {min} players to start")]
    NotEnoughPlayers { min: usize },

    #[error("only the host can do that")]
    NotHost,

    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    #[error("waiting for the eliminated player's word guess")]
    GuessPending,

    #[error("no word guess is awaited")]
    NoGuessPending,

    #[error("turn deadline has not expired")]
    DeadlineNotReached,

    #[error("write conflict persisted after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(StoreError),
}

impl GameError {
    /// Stable code for the wire-level `Error {{ code, msg }}` message.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound => "SESSION_NOT_FOUND",
            GameError::PlayerNotFound => "PLAYER_NOT_FOUND",
            GameError::WrongStatus { .. } => "WRONG_STATUS",
            GameError::OutOfTurn { .. } => "OUT_OF_TURN",
            GameError::AlreadySpoken => "ALREADY_SPOKEN",
            GameError::Eliminated => "ELIMINATED",
            GameError::AlreadyVoted => "ALREADY_VOTED",
            GameError::SelfVote => "SELF_VOTE",
            GameError::InvalidTarget => "INVALID_TARGET",
            GameError::SessionFull => "SESSION_FULL",
            GameError::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
            GameError::NotHost => "NOT_HOST",
            GameError::InvalidConfig(_) => "INVALID_CONFIG",
            GameError::GuessPending => "GUESS_PENDING",
            GameError::NoGuessPending => "NO_GUESS_PENDING",
            GameError::DeadlineNotReached => "DEADLINE_NOT_REACHED",
            GameError::Contention { .. } => "CONTENTION",
            GameError::Invariant(_) => "INVARIANT_VIOLATION",
            GameError::Store(_) => "STORE_ERROR",
        }
    }

    /// True for local phase/eligibility rejections that left state untouched.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            GameError::Contention { .. } | GameError::Invariant(_) | GameError::Store(_)
        )
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(_) | StoreError::UnknownJoinCode(_) => {
                GameError::SessionNotFound
            }
            StoreError::PlayerNotFound(_) => GameError::PlayerNotFound,
            other => GameError::Store(other),
        }
    }
}
