//! Elimination side effects and the win condition.

use chrono::{DateTime, Utc};

use super::turns;
use crate::error::{GameError, GameResult};
use crate::notify::EventKind;
use crate::store::{PlayerPatch, PlayerWrite};
use crate::types::{Player, Session, SessionStatus, Winner};

/// Eliminate `target_id` and evaluate the outcome, mutating `session` in
/// place and returning the player writes and events of the transition.
///
/// Clears every player's clues and ballot, then either finishes the session
/// (no infiltrators left → civilians; infiltrators at parity or better →
/// infiltrators) or resumes play from the top of the turn order. The caller
/// decides whether the mister-white endgame intercepts before this runs.
pub(crate) fn apply_elimination(
    session: &mut Session,
    players: &[Player],
    target_id: &str,
    now: DateTime<Utc>,
) -> GameResult<(Vec<PlayerWrite>, Vec<EventKind>)> {
    let target = players
        .iter()
        .find(|p| p.id == target_id)
        .ok_or(GameError::PlayerNotFound)?;

    let writes = vec![
        PlayerWrite::Update(
            target_id.to_string(),
            PlayerPatch::new().with_eliminated(true),
        ),
        PlayerWrite::UpdateAll(
            PlayerPatch::new()
                .with_clues(vec![])
                .with_vote_target(None),
        ),
    ];
    let mut events = vec![EventKind::PlayerEliminated {
        player_id: target_id.to_string(),
        role: target.role,
    }];

    let remaining: Vec<&Player> = players
        .iter()
        .filter(|p| !p.eliminated && p.id != target_id)
        .collect();
    let infiltrators = remaining.iter().filter(|p| p.role.is_infiltrator()).count();
    let civilians = remaining
        .iter()
        .filter(|p| p.role == crate::types::Role::Civilian)
        .count();

    session.awaiting_guess_from = None;

    if infiltrators == 0 {
        finish(session, Winner::Civilians);
        events.push(EventKind::SessionFinished {
            winner: Winner::Civilians,
        });
    } else if infiltrators >= civilians {
        finish(session, Winner::Infiltrators);
        events.push(EventKind::SessionFinished {
            winner: Winner::Infiltrators,
        });
    } else {
        // Play on: fresh rounds from the top of the turn order.
        session.status = SessionStatus::Playing;
        let alive = |pid: &str| {
            pid != target_id
                && players.iter().any(|p| p.id == pid && !p.eliminated)
        };
        session.current_turn_index = turns::next_active_index(&session.turn_order, alive, 0)?;
        session.turn_deadline = turns::turn_deadline(&session.config, now);
    }

    Ok((writes, events))
}

fn finish(session: &mut Session, winner: Winner) {
    session.status = SessionStatus::Finished;
    session.winner = Some(winner);
    session.turn_deadline = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, SessionConfig};

    fn player(id: &str, role: Role, eliminated: bool) -> Player {
        Player {
            id: id.into(),
            session_id: "s".into(),
            user_id: format!("u-{id}"),
            username: id.into(),
            role,
            secret_word: None,
            eliminated,
            clues: vec!["old".into()],
            vote_target: None,
            joined_at: "t".into(),
        }
    }

    fn voting_session(order: &[&str]) -> Session {
        Session {
            id: "s".into(),
            join_code: "123456".into(),
            host_id: "u-a".into(),
            version: 9,
            status: SessionStatus::Voting,
            config: SessionConfig::default(),
            turn_order: order.iter().map(|s| s.to_string()).collect(),
            current_turn_index: 10,
            vote_round: 2,
            civilian_word: Some("Lion".into()),
            undercover_word: Some("Tigre".into()),
            awaiting_guess_from: None,
            winner: None,
            turn_deadline: None,
            created_at: "t".into(),
        }
    }

    #[test]
    fn last_infiltrator_out_means_civilians_win() {
        let mut session = voting_session(&["a", "b", "c", "d"]);
        let players = vec![
            player("a", Role::Civilian, false),
            player("b", Role::Civilian, false),
            player("c", Role::Civilian, false),
            player("d", Role::Undercover, false),
        ];

        let (_, events) = apply_elimination(&mut session, &players, "d", Utc::now()).unwrap();
        assert_eq!(session.status, SessionStatus::Finished);
        assert_eq!(session.winner, Some(Winner::Civilians));
        assert!(events.contains(&EventKind::SessionFinished {
            winner: Winner::Civilians
        }));
    }

    #[test]
    fn infiltrator_parity_means_infiltrators_win() {
        // Eliminating a civilian leaves 1 undercover vs 1 civilian.
        let mut session = voting_session(&["a", "b", "c"]);
        let players = vec![
            player("a", Role::Civilian, false),
            player("b", Role::Civilian, false),
            player("c", Role::Undercover, false),
        ];

        let (_, events) = apply_elimination(&mut session, &players, "a", Utc::now()).unwrap();
        assert_eq!(session.winner, Some(Winner::Infiltrators));
        assert!(events.contains(&EventKind::SessionFinished {
            winner: Winner::Infiltrators
        }));
    }

    #[test]
    fn game_continues_with_index_reset_past_the_eliminated() {
        let mut session = voting_session(&["a", "b", "c", "d", "e"]);
        let players = vec![
            player("a", Role::Civilian, false),
            player("b", Role::Civilian, false),
            player("c", Role::Civilian, false),
            player("d", Role::Civilian, false),
            player("e", Role::Undercover, false),
        ];

        let (writes, _) = apply_elimination(&mut session, &players, "a", Utc::now()).unwrap();
        assert_eq!(session.status, SessionStatus::Playing);
        // position 0 just got eliminated, so the fresh round starts at 1
        assert_eq!(session.current_turn_index, 1);
        assert!(writes.iter().any(|w| matches!(
            w,
            PlayerWrite::UpdateAll(patch)
                if patch.clues.as_deref() == Some(&[][..]) && patch.vote_target == Some(None)
        )));
    }

    #[test]
    fn resumed_play_restarts_the_turn_timer() {
        let mut session = voting_session(&["a", "b", "c", "d", "e"]);
        session.config.turn_seconds = Some(20);
        let players = vec![
            player("a", Role::Civilian, false),
            player("b", Role::Civilian, false),
            player("c", Role::Civilian, false),
            player("d", Role::Civilian, false),
            player("e", Role::Undercover, false),
        ];

        apply_elimination(&mut session, &players, "b", Utc::now()).unwrap();
        assert_eq!(session.status, SessionStatus::Playing);
        assert!(session.turn_deadline.is_some());
    }
}
