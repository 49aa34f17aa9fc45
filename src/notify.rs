//! Realtime change notification.
//!
//! The coordinator publishes one event per state change after the commit
//! lands. Publishing is fire-and-forget: nobody listening is fine, and a
//! failed send never rolls back or blocks a committed transition. Events
//! carry the committed snapshot so subscribers do not need to refetch.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::types::{PlayerId, Role, SessionId, SessionSnapshot, Winner};

/// What happened in a committed transition.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    PlayerJoined { player_id: PlayerId },
    SessionStarted,
    ClueSubmitted { player_id: PlayerId, skipped: bool },
    VotingOpened { vote_round: u32 },
    VoteCast { player_id: PlayerId },
    BallotTied { vote_round: u32 },
    PlayerEliminated { player_id: PlayerId, role: Role },
    GuessAwaited { player_id: PlayerId },
    GuessResolved { player_id: PlayerId, correct: bool },
    SessionFinished { winner: Winner },
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub snapshot: SessionSnapshot,
}

pub trait RealtimeNotifier: Send + Sync {
    fn publish(&self, session_id: &str, event: SessionEvent);
}

/// Channel capacity per session; slow subscribers lag rather than block.
const CHANNEL_CAPACITY: usize = 100;

/// Notifier backed by one broadcast channel per session. Dropping the
/// receiver returned by [`BroadcastNotifier::subscribe`] unsubscribes.
pub struct BroadcastNotifier {
    channels: RwLock<HashMap<SessionId, broadcast::Sender<SessionEvent>>>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let mut channels = self.channels.write().expect("notifier lock poisoned");
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeNotifier for BroadcastNotifier {
    fn publish(&self, session_id: &str, event: SessionEvent) {
        let stale = {
            let channels = self.channels.read().expect("notifier lock poisoned");
            match channels.get(session_id) {
                // Send errors only mean nobody is listening
                Some(sender) => sender.send(event).is_err(),
                None => false,
            }
        };
        // Drop channels nobody listens to anymore
        if stale {
            let mut channels = self.channels.write().expect("notifier lock poisoned");
            if channels
                .get(session_id)
                .is_some_and(|s| s.receiver_count() == 0)
            {
                channels.remove(session_id);
            }
        }
    }
}
