//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stamp;

/// A freeform note. Collections are kept newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub content: String,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn new(id: i64, content: impl Into<String>) -> Self {
        let now = crate::util::now();
        Self {
            id,
            content: content.into(),
            timestamp: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Some(stamp(self.updated_at));
    }

    /// Get first line as title preview, truncated to `max_len` characters
    pub fn title_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
