//! Turn-timeout watcher.
//!
//! Scans for sessions whose turn deadline has passed and drives the skip
//! transition. The skip revalidates against fresh state inside the
//! coordinator, so a clue that lands between the scan and the skip simply
//! wins the race and moves the deadline.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::SessionCoordinator;

const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn a background task that skips expired turns.
pub fn spawn_turn_deadline_watcher(coordinator: Arc<SessionCoordinator>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SCAN_INTERVAL).await;

            let now = chrono::Utc::now().to_rfc3339();
            let due = match coordinator.sessions_due(&now).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::warn!("deadline scan failed: {}", e);
                    continue;
                }
            };

            for session_id in due {
                match coordinator.advance_on_timeout(&session_id).await {
                    Ok(_) => {
                        tracing::info!("session {}: turn skipped on timeout", session_id);
                    }
                    Err(e) if e.is_rejection() => {
                        // A clue beat the skip, or the session moved on
                        tracing::debug!("session {}: skip not applied: {}", session_id, e);
                    }
                    Err(e) => {
                        tracing::warn!("session {}: timeout skip failed: {}", session_id, e);
                    }
                }
            }
        }
    });
}
