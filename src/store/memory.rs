//! In-memory session store.
//!
//! A single `RwLock` over all records serves as the transaction boundary: a
//! conditional commit checks the version, applies the session and every
//! player write, and becomes visible to readers in one step.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PlayerWrite, SessionStore, StoreError, StoreResult};
use crate::types::{Player, PlayerId, Session, SessionId, SessionSnapshot};

#[derive(Default)]
struct Records {
    sessions: HashMap<SessionId, Session>,
    players: HashMap<PlayerId, Player>,
    join_codes: HashMap<String, SessionId>,
}

impl Records {
    fn players_of(&self, session_id: &str) -> Vec<Player> {
        let mut players: Vec<Player> = self
            .players
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        players.sort_by(|a, b| (&a.joined_at, &a.id).cmp(&(&b.joined_at, &b.id)));
        players
    }
}

pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.join_codes.contains_key(&session.join_code) {
            return Err(StoreError::DuplicateJoinCode(session.join_code));
        }
        records
            .join_codes
            .insert(session.join_code.clone(), session.id.clone());
        records.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<Session> {
        let records = self.records.read().await;
        records
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    async fn session_by_join_code(&self, code: &str) -> StoreResult<Session> {
        let records = self.records.read().await;
        let id = records
            .join_codes
            .get(code)
            .ok_or_else(|| StoreError::UnknownJoinCode(code.to_string()))?;
        records
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.clone()))
    }

    async fn get_player(&self, id: &str) -> StoreResult<Player> {
        let records = self.records.read().await;
        records
            .players
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::PlayerNotFound(id.to_string()))
    }

    async fn list_players(&self, session_id: &str) -> StoreResult<Vec<Player>> {
        let records = self.records.read().await;
        if !records.sessions.contains_key(session_id) {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        Ok(records.players_of(session_id))
    }

    async fn update_session(
        &self,
        id: &str,
        expected_version: u64,
        mut session: Session,
        writes: Vec<PlayerWrite>,
    ) -> StoreResult<SessionSnapshot> {
        let mut records = self.records.write().await;
        let stored = records
            .sessions
            .get(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        for write in writes {
            match write {
                PlayerWrite::Insert(player) => {
                    records.players.insert(player.id.clone(), player);
                }
                PlayerWrite::Update(player_id, patch) => {
                    let player = records
                        .players
                        .get_mut(&player_id)
                        .filter(|p| p.session_id == id)
                        .ok_or(StoreError::PlayerNotFound(player_id))?;
                    patch.apply(player);
                }
                PlayerWrite::UpdateAll(patch) => {
                    for player in records.players.values_mut() {
                        if player.session_id == id {
                            patch.apply(player);
                        }
                    }
                }
            }
        }

        session.version = expected_version + 1;
        records.sessions.insert(id.to_string(), session.clone());

        Ok(SessionSnapshot {
            players: records.players_of(id),
            session,
        })
    }

    async fn sessions_with_expired_deadline(&self, now: &str) -> StoreResult<Vec<SessionId>> {
        let Ok(now) = chrono::DateTime::parse_from_rfc3339(now) else {
            return Ok(vec![]);
        };
        let records = self.records.read().await;
        Ok(records
            .sessions
            .values()
            .filter(|s| {
                s.turn_deadline
                    .as_deref()
                    .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                    .is_some_and(|deadline| deadline <= now)
            })
            .map(|s| s.id.clone())
            .collect())
    }
}
