//! Mister-white endgame: one shot at the civilian word.

use chrono::{DateTime, Utc};

use super::{win, Transition};
use crate::error::{GameError, GameResult};
use crate::notify::EventKind;
use crate::store::{PlayerPatch, PlayerWrite};
use crate::types::{Player, Session, SessionStatus, Winner};

/// Resolve the pending mister-white guess. A correct guess (case-insensitive,
/// whitespace-trimmed) ends the session with mister white the sole winner; a
/// wrong one applies the ordinary elimination side effects. Either way the
/// guess flag is consumed, so the vote result is never re-evaluated.
pub(crate) fn guess_civilian_word(
    session: &Session,
    players: &[Player],
    guess: &str,
    now: DateTime<Utc>,
) -> GameResult<Transition> {
    let guesser_id = session
        .awaiting_guess_from
        .clone()
        .ok_or(GameError::NoGuessPending)?;
    let civilian_word = session
        .civilian_word
        .as_deref()
        .ok_or_else(|| GameError::Invariant("session has no civilian word".into()))?;

    let correct = normalize(guess) == normalize(civilian_word);
    let mut next = session.clone();
    next.awaiting_guess_from = None;

    if correct {
        next.status = SessionStatus::Finished;
        next.winner = Some(Winner::MisterWhite);
        next.turn_deadline = None;
        return Ok(Transition {
            session: next,
            writes: vec![PlayerWrite::Update(
                guesser_id.clone(),
                PlayerPatch::new().with_eliminated(true),
            )],
            events: vec![
                EventKind::GuessResolved {
                    player_id: guesser_id,
                    correct: true,
                },
                EventKind::SessionFinished {
                    winner: Winner::MisterWhite,
                },
            ],
        });
    }

    let (writes, mut events) = win::apply_elimination(&mut next, players, &guesser_id, now)?;
    let mut all_events = vec![EventKind::GuessResolved {
        player_id: guesser_id,
        correct: false,
    }];
    all_events.append(&mut events);
    Ok(Transition {
        session: next,
        writes,
        events: all_events,
    })
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, SessionConfig};

    fn player(id: &str, role: Role) -> Player {
        Player {
            id: id.into(),
            session_id: "s".into(),
            user_id: format!("u-{id}"),
            username: id.into(),
            role,
            secret_word: None,
            eliminated: false,
            clues: vec![],
            vote_target: None,
            joined_at: "t".into(),
        }
    }

    fn session_awaiting(guesser: &str) -> Session {
        Session {
            id: "s".into(),
            join_code: "123456".into(),
            host_id: "u-a".into(),
            version: 11,
            status: SessionStatus::Voting,
            config: SessionConfig::default(),
            turn_order: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            current_turn_index: 5,
            vote_round: 1,
            civilian_word: Some("Lion".into()),
            undercover_word: Some("Tigre".into()),
            awaiting_guess_from: Some(guesser.into()),
            winner: None,
            turn_deadline: None,
            created_at: "t".into(),
        }
    }

    fn five_players() -> Vec<Player> {
        vec![
            player("a", Role::Civilian),
            player("b", Role::Civilian),
            player("c", Role::Civilian),
            player("d", Role::Undercover),
            player("e", Role::MisterWhite),
        ]
    }

    #[test]
    fn correct_guess_wins_despite_elimination() {
        let session = session_awaiting("e");
        let t = guess_civilian_word(&session, &five_players(), "  lion ", Utc::now()).unwrap();

        assert_eq!(t.session.status, SessionStatus::Finished);
        assert_eq!(t.session.winner, Some(Winner::MisterWhite));
        assert!(t.session.awaiting_guess_from.is_none());
        assert!(t.writes.iter().any(|w| matches!(
            w,
            PlayerWrite::Update(id, patch) if id == "e" && patch.eliminated == Some(true)
        )));
    }

    #[test]
    fn wrong_guess_falls_back_to_ordinary_elimination() {
        let session = session_awaiting("e");
        let t = guess_civilian_word(&session, &five_players(), "zebra", Utc::now()).unwrap();

        // One undercover remains against three civilians: play continues.
        assert_eq!(t.session.status, SessionStatus::Playing);
        assert_eq!(t.session.current_turn_index, 0);
        assert!(t.session.awaiting_guess_from.is_none());
        assert!(t.events.contains(&EventKind::GuessResolved {
            player_id: "e".into(),
            correct: false,
        }));
        assert!(t.events.contains(&EventKind::PlayerEliminated {
            player_id: "e".into(),
            role: Role::MisterWhite,
        }));
    }

    #[test]
    fn guess_without_pending_flag_is_rejected() {
        let mut session = session_awaiting("e");
        session.awaiting_guess_from = None;
        let err = guess_civilian_word(&session, &five_players(), "lion", Utc::now()).unwrap_err();
        assert!(matches!(err, GameError::NoGuessPending));
    }
}
