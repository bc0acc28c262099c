use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single to-do item. Field names on the wire match the stored slot
/// written by earlier versions (`createdAt`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Builds a pending record. `text` must already be trimmed and non-empty.
    pub fn new_active(id: String, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
        }
    }
}

/// Millisecond timestamp id, bumped until it does not collide with `existing`.
pub fn timestamp_id(now: DateTime<Utc>, existing: &[TaskRecord]) -> String {
    let mut candidate = now.timestamp_millis();
    while existing.iter().any(|t| t.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}
