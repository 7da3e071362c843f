//! Plan and subtask models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{stamp, Priority};

/// A step of a plan. Position within the parent's list is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subtask {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        let now = crate::util::now();
        Self {
            id,
            text: text.into(),
            completed: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// A long-term plan made of ordered subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        let now = crate::util::now();
        Self {
            id,
            title: title.into(),
            description: String::new(),
            subtasks: Vec::new(),
            priority: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// A plan is completed once it has subtasks and all of them are done.
    /// An empty plan is always in progress.
    pub fn is_completed(&self) -> bool {
        !self.subtasks.is_empty() && self.subtasks.iter().all(|subtask| subtask.completed)
    }

    /// Number of completed subtasks out of the total.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }

    pub fn subtask_mut(&mut self, subtask_id: i64) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }

    /// Stamp the plan itself. Subtask edits stamp the parent too, since the
    /// plan is the unit that syncs.
    pub fn touch(&mut self) {
        self.updated_at = Some(stamp(self.updated_at));
    }

    pub fn touch_subtask(&mut self, subtask_id: i64) {
        if let Some(subtask) = self.subtask_mut(subtask_id) {
            subtask.updated_at = Some(stamp(subtask.updated_at));
        }
        self.touch();
    }

    /// Move a subtask to `index` (clamped to the end), keeping the relative
    /// order of the others. Returns `false` when the subtask is unknown.
    pub fn move_subtask(&mut self, subtask_id: i64, index: usize) -> bool {
        let Some(from) = self.subtasks.iter().position(|s| s.id == subtask_id) else {
            return false;
        };
        let subtask = self.subtasks.remove(from);
        let to = index.min(self.subtasks.len());
        self.subtasks.insert(to, subtask);
        self.touch_subtask(subtask_id);
        true
    }
}
