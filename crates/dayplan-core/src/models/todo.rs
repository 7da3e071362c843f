//! Todo model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{stamp, DayKey, Priority};

/// A todo owned by exactly one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Creation-timestamp-derived identifier (Unix ms)
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Day this todo belongs to
    pub date_key: DayKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last mutation time, the only conflict-resolution signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Todo {
    /// Create a new open todo for `date_key`.
    pub fn new(id: i64, date_key: DayKey, text: impl Into<String>) -> Self {
        let now = crate::util::now();
        Self {
            id,
            text: text.into(),
            completed: false,
            priority: None,
            date_key,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    /// Flip completion and stamp `updated_at`.
    pub fn toggle(&mut self) {
        self.completed = !self.completed;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(stamp(self.updated_at));
    }
}
