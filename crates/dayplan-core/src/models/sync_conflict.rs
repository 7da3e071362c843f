//! Sync conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Todo,
    Plan,
    Note,
}

impl RecordKind {
    /// Remote table name for this kind.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Todo => "todos",
            Self::Plan => "plans",
            Self::Note => "notes",
        }
    }
}

/// Which side survived a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    LocalWins,
    RemoteWins,
}

/// A record present on both sides with differing content, resolved by
/// last-writer-wins on `updatedAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub kind: RecordKind,
    pub record_id: i64,
    pub local_updated_at: Option<DateTime<Utc>>,
    pub remote_updated_at: Option<DateTime<Utc>>,
    pub resolution: ConflictResolution,
    pub resolved_at: DateTime<Utc>,
}
