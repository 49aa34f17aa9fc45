//! WebSocket message dispatch
//!
//! Maps client messages onto coordinator operations. Typed rejections come
//! back as `Error { code, msg }`; messages that name a session also subscribe
//! the connection to that session's event stream.

use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage, SnapshotView};
use crate::types::SessionId;

use super::AppState;

/// What a handled message produced: an optional direct reply, and an optional
/// session to subscribe the connection to.
#[derive(Debug, Default)]
pub struct Outcome {
    pub reply: Option<ServerMessage>,
    pub subscribe: Option<SessionId>,
}

impl Outcome {
    fn reply(msg: ServerMessage) -> Self {
        Self {
            reply: Some(msg),
            subscribe: None,
        }
    }

    fn reply_and_subscribe(msg: ServerMessage, session_id: SessionId) -> Self {
        Self {
            reply: Some(msg),
            subscribe: Some(session_id),
        }
    }
}

/// Handle a client message and return the outcome.
pub async fn handle_message(msg: ClientMessage, state: &AppState) -> Outcome {
    match msg {
        ClientMessage::CreateSession {
            user_id,
            username,
            config,
        } => {
            let config = config.unwrap_or_default();
            match state
                .coordinator
                .create_session(&user_id, &username, config)
                .await
            {
                Ok((snapshot, player_id)) => Outcome::reply_and_subscribe(
                    ServerMessage::SessionCreated {
                        player_id,
                        view: SnapshotView::from(&snapshot),
                    },
                    snapshot.session.id,
                ),
                Err(e) => Outcome::reply(error_message(e)),
            }
        }

        ClientMessage::JoinSession {
            join_code,
            user_id,
            username,
        } => {
            match state
                .coordinator
                .join_session(&join_code, &user_id, &username)
                .await
            {
                Ok((snapshot, player_id)) => Outcome::reply_and_subscribe(
                    ServerMessage::SessionJoined {
                        player_id,
                        view: SnapshotView::from(&snapshot),
                    },
                    snapshot.session.id,
                ),
                Err(e) => Outcome::reply(error_message(e)),
            }
        }

        ClientMessage::StartSession {
            session_id,
            user_id,
        } => match state.coordinator.start_session(&session_id, &user_id).await {
            Ok(snapshot) => Outcome::reply(ServerMessage::SessionState {
                view: SnapshotView::from(&snapshot),
            }),
            Err(e) => Outcome::reply(error_message(e)),
        },

        ClientMessage::SubmitClue {
            session_id,
            player_id,
            text,
        } => match state
            .coordinator
            .submit_clue(&session_id, &player_id, &text)
            .await
        {
            Ok(_) => Outcome::reply(ServerMessage::ClueAccepted),
            Err(e) => Outcome::reply(error_message(e)),
        },

        ClientMessage::SubmitVote {
            session_id,
            player_id,
            target_id,
        } => match state
            .coordinator
            .submit_vote(&session_id, &player_id, &target_id)
            .await
        {
            Ok(_) => Outcome::reply(ServerMessage::VoteAccepted),
            Err(e) => Outcome::reply(error_message(e)),
        },

        ClientMessage::GuessWord { session_id, guess } => {
            match state
                .coordinator
                .guess_civilian_word(&session_id, &guess)
                .await
            {
                Ok(snapshot) => Outcome::reply(ServerMessage::SessionState {
                    view: SnapshotView::from(&snapshot),
                }),
                Err(e) => Outcome::reply(error_message(e)),
            }
        }

        ClientMessage::RevealWord {
            session_id,
            player_id,
        } => match state.coordinator.secret_word(&session_id, &player_id).await {
            Ok(word) => Outcome::reply(ServerMessage::SecretWord { word }),
            Err(e) => Outcome::reply(error_message(e)),
        },

        ClientMessage::GetSession { session_id } => {
            match state.coordinator.snapshot(&session_id).await {
                Ok(snapshot) => Outcome::reply_and_subscribe(
                    ServerMessage::SessionState {
                        view: SnapshotView::from(&snapshot),
                    },
                    session_id,
                ),
                Err(e) => Outcome::reply(error_message(e)),
            }
        }
    }
}

fn error_message(err: GameError) -> ServerMessage {
    if err.is_rejection() {
        tracing::info!("rejected: {}", err);
    } else {
        tracing::error!("operation failed: {}", err);
    }
    ServerMessage::Error {
        code: err.code().to_string(),
        msg: err.to_string(),
    }
}
