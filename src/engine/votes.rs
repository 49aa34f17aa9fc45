//! Ballot collection and resolution.
//!
//! Votes are always tallied from the authoritative player list, never from
//! accumulated counters. The vote that completes the ballot carries the whole
//! resolution (tally, target clearing, status/vote-round change, elimination)
//! in its own transition, so the session-version CAS makes resolution happen
//! exactly once per ballot no matter how many clients observe completion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{win, Transition};
use crate::error::{GameError, GameResult};
use crate::notify::EventKind;
use crate::store::{PlayerPatch, PlayerWrite};
use crate::types::{Player, Role, Session, SessionStatus};

/// Record a vote; if it is the ballot's last missing vote, resolve the ballot
/// in the same transition.
pub(crate) fn submit_vote(
    session: &Session,
    players: &[Player],
    voter_id: &str,
    target_id: &str,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    if session.status != SessionStatus::Voting {
        return Err(GameError::WrongStatus {
            expected: SessionStatus::Voting,
            actual: session.status,
        });
    }
    if session.awaiting_guess_from.is_some() {
        return Err(GameError::GuessPending);
    }

    let voter = players
        .iter()
        .find(|p| p.id == voter_id)
        .ok_or(GameError::PlayerNotFound)?;
    if voter.eliminated {
        return Err(GameError::Eliminated);
    }
    if voter_id == target_id {
        return Err(GameError::SelfVote);
    }
    let target_ok = players
        .iter()
        .any(|p| p.id == target_id && !p.eliminated);
    if !target_ok {
        return Err(GameError::InvalidTarget);
    }
    if voter.vote_target.is_some() {
        return Err(GameError::AlreadyVoted);
    }

    let active: Vec<&Player> = players.iter().filter(|p| !p.eliminated).collect();
    let voted = active
        .iter()
        .filter(|p| p.id == voter_id || p.vote_target.is_some())
        .count();

    if voted < active.len() {
        return Ok(Transition {
            session: session.clone(),
            writes: vec![PlayerWrite::Update(
                voter_id.to_string(),
                PlayerPatch::new().with_vote_target(Some(target_id.to_string())),
            )],
            events: vec![EventKind::VoteCast {
                player_id: voter_id.to_string(),
            }],
        });
    }

    // This vote closes the ballot: resolve it now, in the same commit.
    let tally = tally(session, &active, voter_id, target_id);
    resolve(session, players, tally, voter_id, now)
}

/// Count this ballot's votes per target, including the vote being submitted.
/// Ballots referencing an inactive target are dropped with a warning; they
/// indicate a writer bug, and the authoritative list is what counts.
fn tally(
    session: &Session,
    active: &[&Player],
    voter_id: &str,
    target_id: &str,
) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for player in active {
        let target = if player.id == voter_id {
            Some(target_id)
        } else {
            player.vote_target.as_deref()
        };
        let Some(target) = target else { continue };
        if active.iter().any(|p| p.id == target) {
            *counts.entry(target.to_string()).or_insert(0) += 1;
        } else {
            tracing::warn!(
                "session {}: dropping vote for inactive target {} in vote round {}",
                session.id,
                target,
                session.vote_round
            );
        }
    }
    counts
}

fn resolve(
    session: &Session,
    players: &[Player],
    tally: HashMap<String, u32>,
    voter_id: &str,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    let mut counts: Vec<(String, u32)> = tally.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let vote_event = EventKind::VoteCast {
        player_id: voter_id.to_string(),
    };

    let tied = match counts.as_slice() {
        [] => true, // nothing countable survived; revote rather than guess
        [_] => false,
        [(_, first), (_, second), ..] => first == second,
    };

    let mut next = session.clone();

    if tied {
        next.vote_round += 1;
        let vote_round = next.vote_round;
        return Ok(Transition {
            session: next,
            writes: vec![PlayerWrite::UpdateAll(
                PlayerPatch::new().with_vote_target(None),
            )],
            events: vec![vote_event, EventKind::BallotTied { vote_round }],
        });
    }

    let candidate_id = counts[0].0.clone();
    let candidate = players
        .iter()
        .find(|p| p.id == candidate_id)
        .ok_or_else(|| GameError::Invariant("tally produced an unknown candidate".into()))?;

    if candidate.role == Role::MisterWhite {
        // The endgame intercepts: the ballot is resolved (targets cleared),
        // but the elimination waits for the word guess.
        next.awaiting_guess_from = Some(candidate_id.clone());
        return Ok(Transition {
            session: next,
            writes: vec![PlayerWrite::UpdateAll(
                PlayerPatch::new().with_vote_target(None),
            )],
            events: vec![vote_event, EventKind::GuessAwaited {
                player_id: candidate_id,
            }],
        });
    }

    let (writes, mut events) = win::apply_elimination(&mut next, players, &candidate_id, now)?;
    let mut all_events = vec![vote_event];
    all_events.append(&mut events);
    Ok(Transition {
        session: next,
        writes,
        events: all_events,
    })
}
