//! Session coordinator: the one component allowed to write state transitions.
//!
//! Every operation follows the same shape: read the session and its players,
//! compute the full transition from that consistent view, then commit it with
//! a conditional write keyed on the session version. A concurrent writer
//! makes the commit fail, in which case the whole transition is recomputed
//! against fresh state — so each transition applies at most once, and losers
//! of a race observe the advanced state instead of double-applying. No lock
//! is held across the store boundary.

mod endgame;
mod turns;
mod votes;
mod win;

use std::sync::Arc;

use chrono::Utc;

use crate::error::{GameError, GameResult};
use crate::notify::{EventKind, RealtimeNotifier, SessionEvent};
use crate::store::{PlayerPatch, PlayerWrite, SessionStore, StoreError};
use crate::types::{
    Player, PlayerId, Session, SessionConfig, SessionId, SessionSnapshot, SessionStatus,
};
use crate::words;

/// Reload-and-retry budget for conflicting commits.
const MAX_COMMIT_ATTEMPTS: u32 = 8;

/// How many fresh join codes to try before giving up on creation.
const MAX_CODE_ATTEMPTS: u32 = 8;

/// A computed state transition: the new session record, the player writes
/// that must land in the same commit, and the events to publish afterwards.
#[derive(Debug)]
pub(crate) struct Transition {
    pub session: Session,
    pub writes: Vec<PlayerWrite>,
    pub events: Vec<EventKind>,
}

pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn RealtimeNotifier>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn RealtimeNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Create a session in Waiting and join the host as its first player.
    pub async fn create_session(
        &self,
        host_user_id: &str,
        username: &str,
        config: SessionConfig,
    ) -> GameResult<(SessionSnapshot, PlayerId)> {
        validate_config(&config)?;

        let mut attempts = 0;
        let session = loop {
            attempts += 1;
            let session = Session {
                id: ulid::Ulid::new().to_string(),
                join_code: words::generate_join_code(),
                host_id: host_user_id.to_string(),
                version: 1,
                status: SessionStatus::Waiting,
                config: config.clone(),
                turn_order: vec![],
                current_turn_index: 0,
                vote_round: 0,
                civilian_word: None,
                undercover_word: None,
                awaiting_guess_from: None,
                winner: None,
                turn_deadline: None,
                created_at: Utc::now().to_rfc3339(),
            };
            match self.store.insert_session(session.clone()).await {
                Ok(()) => break session,
                Err(StoreError::DuplicateJoinCode(code)) if attempts < MAX_CODE_ATTEMPTS => {
                    tracing::debug!("join code {} taken, generating another", code);
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            "session {} created with join code {}",
            session.id,
            session.join_code
        );
        self.join_session(&session.join_code, host_user_id, username)
            .await
    }

    /// Join a waiting session by its code. Re-joining with a known user id
    /// returns the current state without inserting a duplicate player.
    pub async fn join_session(
        &self,
        join_code: &str,
        user_id: &str,
        username: &str,
    ) -> GameResult<(SessionSnapshot, PlayerId)> {
        let session = self.store.session_by_join_code(join_code).await?;
        let session_id = session.id.clone();

        let mut joined: Option<PlayerId> = None;
        let snapshot = self
            .transact(&session_id, |session, players| {
                if let Some(existing) = players.iter().find(|p| p.user_id == user_id) {
                    joined = Some(existing.id.clone());
                    return Ok(None);
                }
                if session.status != SessionStatus::Waiting {
                    return Err(GameError::WrongStatus {
                        expected: SessionStatus::Waiting,
                        actual: session.status,
                    });
                }
                if players.len() as u32 >= session.config.max_players {
                    return Err(GameError::SessionFull);
                }

                let player = Player {
                    id: ulid::Ulid::new().to_string(),
                    session_id: session.id.clone(),
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    role: crate::types::Role::Unassigned,
                    secret_word: None,
                    eliminated: false,
                    clues: vec![],
                    vote_target: None,
                    joined_at: Utc::now().to_rfc3339(),
                };
                joined = Some(player.id.clone());
                Ok(Some(Transition {
                    session: session.clone(),
                    writes: vec![PlayerWrite::Insert(player.clone())],
                    events: vec![EventKind::PlayerJoined {
                        player_id: player.id,
                    }],
                }))
            })
            .await?;

        let player_id =
            joined.ok_or_else(|| GameError::Invariant("join committed no player".into()))?;
        tracing::info!("user {} joined session {}", user_id, session_id);
        Ok((snapshot, player_id))
    }

    /// Start a waiting session: assign roles and words, fix the turn order,
    /// and begin the first round. Host only, at least 3 players.
    pub async fn start_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> GameResult<SessionSnapshot> {
        let snapshot = self
            .transact(session_id, |session, players| {
                if session.status != SessionStatus::Waiting {
                    return Err(GameError::WrongStatus {
                        expected: SessionStatus::Waiting,
                        actual: session.status,
                    });
                }
                if session.host_id != user_id {
                    return Err(GameError::NotHost);
                }
                if players.len() < 3 {
                    return Err(GameError::NotEnoughPlayers { min: 3 });
                }
                words::validate_counts(&session.config, players.len())
                    .map_err(GameError::InvalidConfig)?;

                let assignment = words::assign_roles(players, &session.config);
                let now = Utc::now();

                let mut next = session.clone();
                next.status = SessionStatus::Playing;
                next.turn_order = assignment.turn_order;
                next.current_turn_index = 0;
                next.vote_round = 0;
                next.civilian_word = Some(assignment.civilian_word);
                next.undercover_word = Some(assignment.undercover_word);
                next.turn_deadline = turns::turn_deadline(&session.config, now);

                let writes = assignment
                    .roles
                    .into_iter()
                    .map(|(player_id, role, word)| {
                        PlayerWrite::Update(
                            player_id,
                            PlayerPatch::new().with_role(role).with_secret_word(word),
                        )
                    })
                    .collect();

                Ok(Some(Transition {
                    session: next,
                    writes,
                    events: vec![EventKind::SessionStarted],
                }))
            })
            .await?;

        tracing::info!(
            "session {} started with {} players",
            session_id,
            snapshot.players.len()
        );
        Ok(snapshot)
    }

    /// Accept a clue from the current speaker.
    pub async fn submit_clue(
        &self,
        session_id: &str,
        player_id: &str,
        text: &str,
    ) -> GameResult<SessionSnapshot> {
        self.transact(session_id, |session, players| {
            turns::submit_clue(session, players, player_id, text, Utc::now()).map(Some)
        })
        .await
    }

    /// Skip the current turn once its deadline has expired. Safe to race with
    /// a late clue: whichever transition commits first wins the version check.
    pub async fn advance_on_timeout(&self, session_id: &str) -> GameResult<SessionSnapshot> {
        self.transact(session_id, |session, players| {
            turns::advance_on_timeout(session, players, Utc::now()).map(Some)
        })
        .await
    }

    /// Record a vote; the ballot's final vote also resolves it.
    pub async fn submit_vote(
        &self,
        session_id: &str,
        player_id: &str,
        target_id: &str,
    ) -> GameResult<SessionSnapshot> {
        self.transact(session_id, |session, players| {
            votes::submit_vote(session, players, player_id, target_id, Utc::now()).map(Some)
        })
        .await
    }

    /// Resolve the pending mister-white guess.
    pub async fn guess_civilian_word(
        &self,
        session_id: &str,
        guess: &str,
    ) -> GameResult<SessionSnapshot> {
        self.transact(session_id, |session, players| {
            endgame::guess_civilian_word(session, players, guess, Utc::now()).map(Some)
        })
        .await
    }

    /// Current state of a session.
    pub async fn snapshot(&self, session_id: &str) -> GameResult<SessionSnapshot> {
        let session = self.store.get_session(session_id).await?;
        let players = self.store.list_players(session_id).await?;
        Ok(SessionSnapshot { session, players })
    }

    /// A player's own secret word (None for mister white).
    pub async fn secret_word(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> GameResult<Option<String>> {
        let player = self.store.get_player(player_id).await?;
        if player.session_id != session_id {
            return Err(GameError::PlayerNotFound);
        }
        Ok(player.secret_word)
    }

    /// Sessions whose turn deadline has passed; consumed by the timeout watcher.
    pub async fn sessions_due(&self, now: &str) -> GameResult<Vec<SessionId>> {
        Ok(self.store.sessions_with_expired_deadline(now).await?)
    }

    /// Run one transition: read, compute, conditionally commit, publish.
    /// Version conflicts reload and recompute; the caller only sees
    /// [`GameError::Contention`] once the budget is exhausted.
    async fn transact<F>(&self, session_id: &str, mut build: F) -> GameResult<SessionSnapshot>
    where
        F: FnMut(&Session, &[Player]) -> GameResult<Option<Transition>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let session = self.store.get_session(session_id).await?;
            let players = self.store.list_players(session_id).await?;
            let expected = session.version;

            let Some(transition) = build(&session, &players)? else {
                return Ok(SessionSnapshot { session, players });
            };

            match self
                .store
                .update_session(session_id, expected, transition.session, transition.writes)
                .await
            {
                Ok(snapshot) => {
                    for kind in transition.events {
                        self.notifier.publish(
                            session_id,
                            SessionEvent {
                                kind,
                                snapshot: snapshot.clone(),
                            },
                        );
                    }
                    return Ok(snapshot);
                }
                Err(StoreError::VersionConflict { .. }) if attempts < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(
                        "session {}: version conflict on attempt {}, recomputing",
                        session_id,
                        attempts
                    );
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::warn!(
                        "session {}: contention persisted across {} attempts",
                        session_id,
                        attempts
                    );
                    return Err(GameError::Contention { attempts });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn validate_config(config: &SessionConfig) -> GameResult<()> {
    if config.max_players < 3 {
        return Err(GameError::InvalidConfig(
            "max_players must be at least 3".into(),
        ));
    }
    if config.rounds_before_vote == 0 {
        return Err(GameError::InvalidConfig(
            "rounds_before_vote must be at least 1".into(),
        ));
    }
    if config.undercover_count == 0 {
        return Err(GameError::InvalidConfig(
            "at least one undercover is required".into(),
        ));
    }
    if config.turn_seconds == Some(0) {
        return Err(GameError::InvalidConfig(
            "turn_seconds must be positive when set".into(),
        ));
    }
    Ok(())
}
