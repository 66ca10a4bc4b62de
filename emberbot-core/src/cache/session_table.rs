//! Time-limited table of dialog sessions.
//!
//! Entries expire `ttl` after their last write. Expiry is enforced lazily on
//! read (an expired entry is never handed out) and reclaimed in bulk by the
//! background sweep task, so either mechanism alone keeps the table correct.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use emberbot_common::models::{CallbackToken, Session};

/// Sessions live for an hour from their last write.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

struct SessionEntry {
    session: Session,
    deadline: DateTime<Utc>,
}

pub struct SessionTable {
    entries: DashMap<String, SessionEntry>,
    ttl: Duration,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

impl SessionTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Allocates a fresh session for a trigger match. The selected value
    /// starts empty; expiry is `now + ttl`.
    pub fn create(&self, matched: Vec<String>) -> Session {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            matched,
            value: String::new(),
            created_at: Utc::now(),
        };
        self.entries.insert(
            session.session_id.clone(),
            SessionEntry {
                session: session.clone(),
                deadline: Utc::now() + self.ttl,
            },
        );
        session
    }

    /// Looks up the session component of a token. Absent and expired are the
    /// same observable outcome: no session.
    pub fn get(&self, token: &CallbackToken) -> Option<Session> {
        let now = Utc::now();
        match self.entries.get(&token.session_id) {
            Some(entry) if entry.deadline > now => Some(entry.session.clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove(&token.session_id);
                None
            }
            None => None,
        }
    }

    /// Overwrites the stored session and refreshes its deadline.
    pub fn update(&self, token: &CallbackToken, session: Session) {
        self.entries.insert(
            token.session_id.clone(),
            SessionEntry {
                session,
                deadline: Utc::now() + self.ttl,
            },
        );
    }

    /// Drops every expired entry. Called by the background sweep.
    pub fn prune_expired(&self) {
        let now = Utc::now();
        // Count inside the closure: entries can be inserted concurrently
        // while retain runs, so before/after length arithmetic is wrong.
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let keep = entry.deadline > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, "pruned expired sessions");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
