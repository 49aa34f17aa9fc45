//! Wire protocol for the WebSocket layer.
//!
//! Broadcast payloads are redacted views: living players' roles, everyone's
//! secret words and ballot targets stay server-side. A player fetches their
//! own word with `RevealWord`; roles become public per player on elimination
//! and wholesale once the session is finished.

use serde::{Deserialize, Serialize};

use crate::notify::{EventKind, SessionEvent};
use crate::types::{
    PlayerId, Role, SessionConfig, SessionId, SessionSnapshot, SessionStatus, UserId, Winner,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        user_id: UserId,
        username: String,
        #[serde(default)]
        config: Option<SessionConfig>,
    },
    JoinSession {
        join_code: String,
        user_id: UserId,
        username: String,
    },
    StartSession {
        session_id: SessionId,
        user_id: UserId,
    },
    SubmitClue {
        session_id: SessionId,
        player_id: PlayerId,
        text: String,
    },
    SubmitVote {
        session_id: SessionId,
        player_id: PlayerId,
        target_id: PlayerId,
    },
    GuessWord {
        session_id: SessionId,
        guess: String,
    },
    RevealWord {
        session_id: SessionId,
        player_id: PlayerId,
    },
    GetSession {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: String,
    },
    SessionCreated {
        player_id: PlayerId,
        view: SnapshotView,
    },
    SessionJoined {
        player_id: PlayerId,
        view: SnapshotView,
    },
    SessionState {
        view: SnapshotView,
    },
    SecretWord {
        word: Option<String>,
    },
    ClueAccepted,
    VoteAccepted,
    // Broadcast events
    PlayerJoined {
        player_id: PlayerId,
        view: SnapshotView,
    },
    SessionStarted {
        view: SnapshotView,
    },
    ClueSubmitted {
        player_id: PlayerId,
        skipped: bool,
        view: SnapshotView,
    },
    VotingOpened {
        vote_round: u32,
        view: SnapshotView,
    },
    VoteCast {
        player_id: PlayerId,
        view: SnapshotView,
    },
    BallotTied {
        vote_round: u32,
        view: SnapshotView,
    },
    PlayerEliminated {
        player_id: PlayerId,
        role: Role,
        view: SnapshotView,
    },
    GuessAwaited {
        player_id: PlayerId,
        view: SnapshotView,
    },
    GuessResolved {
        player_id: PlayerId,
        correct: bool,
        view: SnapshotView,
    },
    SessionFinished {
        winner: Winner,
        view: SnapshotView,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Session fields safe to show every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub join_code: String,
    pub host_id: UserId,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub turn_order: Vec<PlayerId>,
    pub current_turn_index: u32,
    pub current_round: u32,
    pub vote_round: u32,
    pub awaiting_guess_from: Option<PlayerId>,
    pub winner: Option<Winner>,
    pub turn_deadline: Option<String>,
    /// Revealed only once the session is finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civilian_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undercover_word: Option<String>,
}

/// Player fields safe to show every subscriber: no secret word, no ballot
/// target, and no role while the player is alive mid-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub user_id: UserId,
    pub username: String,
    pub eliminated: bool,
    pub clues: Vec<String>,
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotView {
    pub session: SessionView,
    pub players: Vec<PlayerView>,
}

impl From<&SessionSnapshot> for SnapshotView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let session = &snapshot.session;
        let finished = session.status == SessionStatus::Finished;

        Self {
            session: SessionView {
                id: session.id.clone(),
                join_code: session.join_code.clone(),
                host_id: session.host_id.clone(),
                status: session.status,
                config: session.config.clone(),
                turn_order: session.turn_order.clone(),
                current_turn_index: session.current_turn_index,
                current_round: session.current_round(),
                vote_round: session.vote_round,
                awaiting_guess_from: session.awaiting_guess_from.clone(),
                winner: session.winner,
                turn_deadline: session.turn_deadline.clone(),
                civilian_word: finished.then(|| session.civilian_word.clone()).flatten(),
                undercover_word: finished.then(|| session.undercover_word.clone()).flatten(),
            },
            players: snapshot
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    user_id: p.user_id.clone(),
                    username: p.username.clone(),
                    eliminated: p.eliminated,
                    clues: p.clues.clone(),
                    has_voted: p.vote_target.is_some(),
                    role: (finished || p.eliminated).then_some(p.role),
                })
                .collect(),
        }
    }
}

/// Broadcast message for a committed transition.
pub fn event_message(event: &SessionEvent) -> ServerMessage {
    let view = SnapshotView::from(&event.snapshot);
    match &event.kind {
        EventKind::PlayerJoined { player_id } => ServerMessage::PlayerJoined {
            player_id: player_id.clone(),
            view,
        },
        EventKind::SessionStarted => ServerMessage::SessionStarted { view },
        EventKind::ClueSubmitted { player_id, skipped } => ServerMessage::ClueSubmitted {
            player_id: player_id.clone(),
            skipped: *skipped,
            view,
        },
        EventKind::VotingOpened { vote_round } => ServerMessage::VotingOpened {
            vote_round: *vote_round,
            view,
        },
        EventKind::VoteCast { player_id } => ServerMessage::VoteCast {
            player_id: player_id.clone(),
            view,
        },
        EventKind::BallotTied { vote_round } => ServerMessage::BallotTied {
            vote_round: *vote_round,
            view,
        },
        EventKind::PlayerEliminated { player_id, role } => ServerMessage::PlayerEliminated {
            player_id: player_id.clone(),
            role: *role,
            view,
        },
        EventKind::GuessAwaited { player_id } => ServerMessage::GuessAwaited {
            player_id: player_id.clone(),
            view,
        },
        EventKind::GuessResolved { player_id, correct } => ServerMessage::GuessResolved {
            player_id: player_id.clone(),
            correct: *correct,
            view,
        },
        EventKind::SessionFinished { winner } => ServerMessage::SessionFinished {
            winner: *winner,
            view,
        },
    }
}
