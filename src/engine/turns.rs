//! Turn scheduling: clue acceptance, skip-aware advance, voting boundary.
//!
//! The turn index only ever moves forward. A round is complete when the index
//! crosses a lap boundary of the (fixed) turn order; eliminated positions are
//! skipped by advancing further, so the lap count stays meaningful no matter
//! which seats are empty. Because the index resets to 0 whenever play
//! (re)starts, the lap count is also the number of rounds completed since the
//! last elimination, which is what the voting boundary compares against.

use chrono::{DateTime, Duration, Utc};

use super::Transition;
use crate::error::{GameError, GameResult};
use crate::notify::EventKind;
use crate::store::{PlayerPatch, PlayerWrite};
use crate::types::{Player, PlayerId, Session, SessionConfig, SessionStatus};

/// Accept a clue from the current speaker and advance the turn.
pub(crate) fn submit_clue(
    session: &Session,
    players: &[Player],
    player_id: &str,
    text: &str,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    if session.status != SessionStatus::Playing {
        return Err(GameError::WrongStatus {
            expected: SessionStatus::Playing,
            actual: session.status,
        });
    }

    let player = players
        .iter()
        .find(|p| p.id == player_id)
        .ok_or(GameError::PlayerNotFound)?;
    if player.eliminated {
        return Err(GameError::Eliminated);
    }

    let expected = session
        .current_speaker()
        .ok_or_else(|| GameError::Invariant("playing session has an empty turn order".into()))?;
    if expected != player_id {
        return Err(GameError::OutOfTurn {
            expected: expected.clone(),
        });
    }

    // clues.len() is the server-side source of truth for "already spoke this
    // round"; client-local flags are never consulted.
    let spoken = player.clues.len() as u32;
    let round = session.current_round();
    if spoken >= round {
        return Err(GameError::AlreadySpoken);
    }
    if spoken + 1 < round {
        tracing::warn!(
            "session {}: player {} is {} clue(s) behind the round counter, accepting anyway",
            session.id,
            player_id,
            round - spoken - 1
        );
    }

    record_and_advance(session, players, player, text.trim(), false, now)
}

/// Skip the current speaker's turn once its deadline has expired. Records an
/// empty clue through the same advance path as a real submission, so a skip
/// and a late clue race safely on the session version.
pub(crate) fn advance_on_timeout(
    session: &Session,
    players: &[Player],
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    if session.status != SessionStatus::Playing {
        return Err(GameError::WrongStatus {
            expected: SessionStatus::Playing,
            actual: session.status,
        });
    }

    let deadline = session
        .turn_deadline
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .ok_or(GameError::DeadlineNotReached)?;
    if now < deadline {
        return Err(GameError::DeadlineNotReached);
    }

    let speaker_id = session
        .current_speaker()
        .ok_or_else(|| GameError::Invariant("playing session has an empty turn order".into()))?
        .clone();
    let speaker = players
        .iter()
        .find(|p| p.id == speaker_id)
        .ok_or_else(|| GameError::Invariant("turn order references an unknown player".into()))?;

    record_and_advance(session, players, speaker, "", true, now)
}

fn record_and_advance(
    session: &Session,
    players: &[Player],
    speaker: &Player,
    text: &str,
    skipped: bool,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    let mut clues = speaker.clues.clone();
    clues.push(text.to_string());

    let alive = |pid: &str| {
        players
            .iter()
            .any(|p| p.id == pid && !p.eliminated)
    };
    let new_index = next_active_index(
        &session.turn_order,
        alive,
        session.current_turn_index + 1,
    )?;

    let len = session.turn_order.len() as u32;
    let old_lap = session.current_turn_index / len;
    let new_lap = new_index / len;

    let mut next = session.clone();
    next.current_turn_index = new_index;
    let mut writes = vec![PlayerWrite::Update(
        speaker.id.clone(),
        PlayerPatch::new().with_clues(clues),
    )];
    let mut events = vec![EventKind::ClueSubmitted {
        player_id: speaker.id.clone(),
        skipped,
    }];

    if new_lap > old_lap && new_lap >= session.config.rounds_before_vote {
        // Enough full rounds spoken since play (re)started: open a ballot.
        next.status = SessionStatus::Voting;
        next.vote_round += 1;
        next.turn_deadline = None;
        writes.push(PlayerWrite::UpdateAll(
            PlayerPatch::new().with_vote_target(None),
        ));
        events.push(EventKind::VotingOpened {
            vote_round: next.vote_round,
        });
    } else {
        next.turn_deadline = turn_deadline(&session.config, now);
    }

    Ok(Transition {
        session: next,
        writes,
        events,
    })
}

/// First index at or after `start` whose turn-order position holds a living
/// player. Errors if a full lap finds nobody alive.
pub(crate) fn next_active_index(
    turn_order: &[PlayerId],
    alive: impl Fn(&str) -> bool,
    start: u32,
) -> GameResult<u32> {
    if turn_order.is_empty() {
        return Err(GameError::Invariant("empty turn order".into()));
    }
    for offset in 0..turn_order.len() as u32 {
        let index = start + offset;
        let position = index as usize % turn_order.len();
        if alive(&turn_order[position]) {
            return Ok(index);
        }
    }
    Err(GameError::Invariant(
        "turn order contains no active player".into(),
    ))
}

/// Deadline for the next turn, when the session runs a turn timer.
pub(crate) fn turn_deadline(config: &SessionConfig, now: DateTime<Utc>) -> Option<String> {
    config
        .turn_seconds
        .map(|secs| (now + Duration::seconds(i64::from(secs))).to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, SessionConfig};

    fn player(id: &str, eliminated: bool) -> Player {
        Player {
            id: id.into(),
            session_id: "s".into(),
            user_id: format!("u-{id}"),
            username: id.into(),
            role: Role::Civilian,
            secret_word: Some("Lion".into()),
            eliminated,
            clues: vec![],
            vote_target: None,
            joined_at: "t".into(),
        }
    }

    fn playing_session(order: &[&str], index: u32, rounds_before_vote: u32) -> Session {
        Session {
            id: "s".into(),
            join_code: "123456".into(),
            host_id: "u-a".into(),
            version: 3,
            status: SessionStatus::Playing,
            config: SessionConfig {
                rounds_before_vote,
                ..SessionConfig::default()
            },
            turn_order: order.iter().map(|s| s.to_string()).collect(),
            current_turn_index: index,
            vote_round: 0,
            civilian_word: Some("Lion".into()),
            undercover_word: Some("Tigre".into()),
            awaiting_guess_from: None,
            winner: None,
            turn_deadline: None,
            created_at: "t".into(),
        }
    }

    #[test]
    fn clue_advances_to_the_next_player() {
        let session = playing_session(&["a", "b", "c"], 0, 2);
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let t = submit_clue(&session, &players, "a", "roar", Utc::now()).unwrap();
        assert_eq!(t.session.current_turn_index, 1);
        assert_eq!(t.session.status, SessionStatus::Playing);
        assert!(matches!(
            t.events[0],
            EventKind::ClueSubmitted { skipped: false, .. }
        ));
    }

    #[test]
    fn out_of_turn_clue_is_rejected() {
        let session = playing_session(&["a", "b", "c"], 0, 2);
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let err = submit_clue(&session, &players, "b", "mane", Utc::now()).unwrap_err();
        assert!(matches!(err, GameError::OutOfTurn { expected } if expected == "a"));
    }

    #[test]
    fn second_clue_in_a_round_is_rejected() {
        // Stale resubmission: "a" already has this round's clue recorded.
        let session = playing_session(&["a", "b", "c"], 0, 2);
        let mut spoke = player("a", false);
        spoke.clues = vec!["roar".into()];
        let players = vec![spoke, player("b", false), player("c", false)];

        let err = submit_clue(&session, &players, "a", "again", Utc::now()).unwrap_err();
        assert!(matches!(err, GameError::AlreadySpoken));
    }

    #[test]
    fn eliminated_players_are_skipped() {
        let session = playing_session(&["a", "b", "c"], 0, 5);
        let players = vec![player("a", false), player("b", true), player("c", false)];

        let t = submit_clue(&session, &players, "a", "roar", Utc::now()).unwrap();
        assert_eq!(t.session.current_turn_index, 2);
    }

    #[test]
    fn completing_the_last_round_opens_a_ballot() {
        let session = playing_session(&["a", "b", "c"], 2, 1);
        let mut a = player("a", false);
        a.clues = vec!["one".into()];
        let mut b = player("b", false);
        b.clues = vec!["two".into()];
        let players = vec![a, b, player("c", false)];

        let t = submit_clue(&session, &players, "c", "three", Utc::now()).unwrap();
        assert_eq!(t.session.status, SessionStatus::Voting);
        assert_eq!(t.session.vote_round, 1);
        assert!(t.session.turn_deadline.is_none());
        assert!(t
            .events
            .contains(&EventKind::VotingOpened { vote_round: 1 }));
        // the ballot opens with every target cleared
        assert!(t.writes.iter().any(|w| matches!(
            w,
            PlayerWrite::UpdateAll(patch) if patch.vote_target == Some(None)
        )));
    }

    #[test]
    fn lap_completes_even_when_position_zero_is_eliminated() {
        // "a" (position 0) is eliminated; the lap ends by skipping over it.
        let session = playing_session(&["a", "b", "c"], 2, 1);
        let mut b = player("b", false);
        b.clues = vec!["two".into()];
        let players = vec![player("a", true), b, player("c", false)];

        let t = submit_clue(&session, &players, "c", "three", Utc::now()).unwrap();
        assert_eq!(t.session.status, SessionStatus::Voting);
        // skipped past the eliminated position into the next lap
        assert_eq!(t.session.current_turn_index, 4);
    }

    #[test]
    fn early_lap_does_not_open_a_ballot() {
        let session = playing_session(&["a", "b", "c"], 2, 2);
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let t = submit_clue(&session, &players, "c", "three", Utc::now()).unwrap();
        assert_eq!(t.session.status, SessionStatus::Playing);
        assert_eq!(t.session.current_turn_index, 3);
        assert_eq!(t.session.current_round(), 2);
    }

    #[test]
    fn timeout_skip_records_an_empty_clue() {
        let mut session = playing_session(&["a", "b", "c"], 0, 2);
        session.config.turn_seconds = Some(20);
        session.turn_deadline = Some("2025-01-01T00:00:00+00:00".into());
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:30+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let t = advance_on_timeout(&session, &players, now).unwrap();
        assert_eq!(t.session.current_turn_index, 1);
        assert!(matches!(
            t.events[0],
            EventKind::ClueSubmitted { skipped: true, .. }
        ));
        match &t.writes[0] {
            PlayerWrite::Update(id, patch) => {
                assert_eq!(id, "a");
                assert_eq!(patch.clues.as_deref(), Some(&["".to_string()][..]));
            }
            other => panic!("unexpected write {other:?}"),
        }
        // the next turn gets a fresh deadline
        assert!(t.session.turn_deadline.is_some());
    }

    #[test]
    fn timeout_before_the_deadline_is_rejected() {
        let mut session = playing_session(&["a", "b", "c"], 0, 2);
        session.turn_deadline = Some("2025-01-01T00:01:00+00:00".into());
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:30+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let err = advance_on_timeout(&session, &players, now).unwrap_err();
        assert!(matches!(err, GameError::DeadlineNotReached));
    }

    #[test]
    fn clue_during_voting_is_rejected() {
        let mut session = playing_session(&["a", "b", "c"], 3, 1);
        session.status = SessionStatus::Voting;
        let players = vec![player("a", false), player("b", false), player("c", false)];

        let err = submit_clue(&session, &players, "a", "late", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            GameError::WrongStatus {
                expected: SessionStatus::Playing,
                ..
            }
        ));
    }
}
