use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type SessionId = String;
pub type PlayerId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Waiting,
    Playing,
    Voting,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unassigned,
    Civilian,
    Undercover,
    MisterWhite,
}

impl Role {
    /// Undercover and mister white count against the civilians for the win condition.
    pub fn is_infiltrator(&self) -> bool {
        matches!(self, Role::Undercover | Role::MisterWhite)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Civilians,
    Infiltrators,
    MisterWhite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub max_players: u32,
    pub rounds_before_vote: u32,
    pub undercover_count: u32,
    pub mister_white_count: u32,
    /// Turn timer in seconds; None disables the timeout skip entirely.
    pub turn_seconds: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            rounds_before_vote: 2,
            undercover_count: 2,
            mister_white_count: 1,
            turn_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// 6-digit human-shareable join code
    pub join_code: String,
    pub host_id: UserId,
    /// Monotonic counter backing the conditional writes; bumped on every commit.
    pub version: u64,
    pub status: SessionStatus,
    pub config: SessionConfig,
    /// Fixed once the session starts; never shrinks, eliminated players are skipped.
    pub turn_order: Vec<PlayerId>,
    pub current_turn_index: u32,
    /// Bumped each time a ballot opens, including revotes after a tie.
    pub vote_round: u32,
    pub civilian_word: Option<String>,
    pub undercover_word: Option<String>,
    /// Set while an eliminated-by-vote mister white may still guess the
    /// civilian word. Gates clues and votes without being a status of its own.
    pub awaiting_guess_from: Option<PlayerId>,
    pub winner: Option<Winner>,
    /// RFC3339 deadline for the current turn, when the config has a turn timer.
    pub turn_deadline: Option<String>,
    pub created_at: String,
}

impl Session {
    /// 1-based round number, derived from the turn index. The index resets to
    /// 0 whenever play (re)starts, so this also counts rounds since the last
    /// elimination or game start.
    pub fn current_round(&self) -> u32 {
        if self.turn_order.is_empty() {
            1
        } else {
            self.current_turn_index / self.turn_order.len() as u32 + 1
        }
    }

    /// Position of the current turn within the turn order.
    pub fn turn_position(&self) -> Option<usize> {
        if self.turn_order.is_empty() {
            None
        } else {
            Some(self.current_turn_index as usize % self.turn_order.len())
        }
    }

    /// Player whose turn it is to speak.
    pub fn current_speaker(&self) -> Option<&PlayerId> {
        self.turn_position().map(|pos| &self.turn_order[pos])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    /// Mister white has no word; neither does anyone before the session starts.
    pub secret_word: Option<String>,
    pub eliminated: bool,
    /// One entry per round this player has spoken in; a skipped turn records "".
    pub clues: Vec<String>,
    /// Present only between casting a vote and the ballot's resolution.
    pub vote_target: Option<PlayerId>,
    pub joined_at: String,
}

/// A session together with its players, as read or committed in one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Session,
    pub players: Vec<Player>,
}

impl SessionSnapshot {
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}
