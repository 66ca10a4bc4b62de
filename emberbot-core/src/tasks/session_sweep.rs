// emberbot-core/src/tasks/session_sweep.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::cache::SessionTable;

/// Spawns a background task that periodically drops expired sessions from
/// the table. Reads already ignore expired entries; this just reclaims the
/// memory.
pub fn spawn_session_sweep_task(
    sessions: Arc<SessionTable>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            sessions.prune_expired();
        }
    })
}
