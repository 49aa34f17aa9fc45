//! Persistence adapter boundary.
//!
//! All shared state lives behind this trait; the coordinator never mutates
//! anything except through [`SessionStore::update_session`], a conditional
//! write keyed on the session's version. Player patches passed to that call
//! commit atomically with the session record, so a vote resolution, its
//! target clearing and the elimination are one indivisible transition.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::types::{Player, PlayerId, Role, Session, SessionId, SessionSnapshot};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("no session with join code {0}")]
    UnknownJoinCode(String),

    #[error("join code {0} is already in use")]
    DuplicateJoinCode(String),

    #[error("version conflict: expected {expected}, stored {actual}")]
    VersionConflict { expected: u64, actual: u64 },
}

/// Partial update of a player record. Unset fields are left untouched;
/// `secret_word` and `vote_target` distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    pub role: Option<Role>,
    pub secret_word: Option<Option<String>>,
    pub eliminated: Option<bool>,
    pub clues: Option<Vec<String>>,
    pub vote_target: Option<Option<PlayerId>>,
}

impl PlayerPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_secret_word(mut self, word: Option<String>) -> Self {
        self.secret_word = Some(word);
        self
    }

    pub fn with_eliminated(mut self, eliminated: bool) -> Self {
        self.eliminated = Some(eliminated);
        self
    }

    pub fn with_clues(mut self, clues: Vec<String>) -> Self {
        self.clues = Some(clues);
        self
    }

    pub fn with_vote_target(mut self, target: Option<PlayerId>) -> Self {
        self.vote_target = Some(target);
        self
    }

    /// Apply this patch to a player record.
    pub fn apply(&self, player: &mut Player) {
        if let Some(role) = self.role {
            player.role = role;
        }
        if let Some(ref word) = self.secret_word {
            player.secret_word = word.clone();
        }
        if let Some(eliminated) = self.eliminated {
            player.eliminated = eliminated;
        }
        if let Some(ref clues) = self.clues {
            player.clues = clues.clone();
        }
        if let Some(ref target) = self.vote_target {
            player.vote_target = target.clone();
        }
    }
}

/// A player mutation carried by a conditional session commit.
#[derive(Debug, Clone)]
pub enum PlayerWrite {
    /// Add a player to the session.
    Insert(Player),
    /// Patch a single player.
    Update(PlayerId, PlayerPatch),
    /// Patch every player of the session (clearing clues or ballots).
    UpdateAll(PlayerPatch),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: Session) -> StoreResult<()>;

    async fn get_session(&self, id: &str) -> StoreResult<Session>;

    async fn session_by_join_code(&self, code: &str) -> StoreResult<Session>;

    async fn get_player(&self, id: &str) -> StoreResult<Player>;

    /// Players of a session in join order.
    async fn list_players(&self, session_id: &str) -> StoreResult<Vec<Player>>;

    /// Conditional write: succeeds only while the stored version still equals
    /// `expected_version`, otherwise fails with [`StoreError::VersionConflict`]
    /// and changes nothing. On success the stored version becomes
    /// `expected_version + 1` (whatever `session.version` said) and all player
    /// writes land in the same commit. Returns the committed snapshot.
    async fn update_session(
        &self,
        id: &str,
        expected_version: u64,
        session: Session,
        writes: Vec<PlayerWrite>,
    ) -> StoreResult<SessionSnapshot>;

    /// Sessions whose turn deadline lies at or before `now` (RFC3339).
    /// Used by the timeout watcher, not by the state machine itself.
    async fn sessions_with_expired_deadline(&self, now: &str) -> StoreResult<Vec<SessionId>>;
}
