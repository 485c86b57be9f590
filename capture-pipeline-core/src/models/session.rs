use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted record of the one active capture session.
///
/// At most one exists. `last_seq_index` holds the next shard index to
/// seal; it only ever moves forward for a given session, so a process
/// restart resumes numbering instead of colliding with or orphaning
/// already-queued shards. Persisting it *after* sealing is what makes
/// sealing at-least-once rather than at-most-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub user_id: String,
    pub session_id: String,
    pub start_ts: DateTime<Utc>,
    pub last_seq_index: u32,
    pub is_active: bool,
}

/// Mint a session id from wall-clock time plus a random suffix, so ids
/// sort roughly by start time but never collide across rapid restarts.
pub fn mint_session_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", now.timestamp_millis(), &suffix[..8])
}
