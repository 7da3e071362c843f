//! Remote store contract and the row schema used on the wire.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::OwnerId;
use crate::models::{DayKey, Note, Plan, Priority, RecordKind, Subtask, Todo};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Owner-scoped table access on the cloud backend.
///
/// Rows are JSON objects carrying a `user_id` column. Writes are upserts
/// keyed on `id`; there is no bulk delete.
pub trait RemoteStore: Send + Sync {
    /// Every row of `kind` owned by `owner`, most recently updated first.
    fn select(
        &self,
        kind: RecordKind,
        owner: &OwnerId,
    ) -> impl Future<Output = RemoteResult<Vec<Value>>> + Send;

    /// Insert or replace `rows` by `id`. The call succeeds or fails as a whole.
    fn upsert(
        &self,
        kind: RecordKind,
        owner: &OwnerId,
        rows: Vec<Value>,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TodoRow {
    pub id: i64,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub date_key: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PlanRow {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NoteRow {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Conversion between a local record and its owner-tagged remote row.
pub(crate) trait RemoteRecord: Sized {
    const KIND: RecordKind;

    fn to_row(&self, owner: &OwnerId) -> RemoteResult<Value>;

    /// `None` when the row cannot be normalized into a record.
    fn from_row(row: Value) -> Option<Self>;
}

impl RemoteRecord for Todo {
    const KIND: RecordKind = RecordKind::Todo;

    fn to_row(&self, owner: &OwnerId) -> RemoteResult<Value> {
        Ok(serde_json::to_value(TodoRow {
            id: self.id,
            user_id: owner.to_string(),
            text: self.text.clone(),
            completed: self.completed,
            priority: self.priority,
            date_key: self.date_key.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })?)
    }

    fn from_row(row: Value) -> Option<Self> {
        let row: TodoRow = decode_row(Self::KIND, row)?;
        let date_key = match row.date_key.parse::<DayKey>() {
            Ok(date_key) => date_key,
            Err(error) => {
                tracing::warn!("Skipping remote todo {}: {}", row.id, error);
                return None;
            }
        };
        Some(Self {
            id: row.id,
            text: row.text,
            completed: row.completed,
            priority: row.priority,
            date_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl RemoteRecord for Plan {
    const KIND: RecordKind = RecordKind::Plan;

    fn to_row(&self, owner: &OwnerId) -> RemoteResult<Value> {
        Ok(serde_json::to_value(PlanRow {
            id: self.id,
            user_id: owner.to_string(),
            title: self.title.clone(),
            description: Some(self.description.clone()),
            subtasks: Some(self.subtasks.clone()),
            priority: self.priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })?)
    }

    fn from_row(row: Value) -> Option<Self> {
        let row: PlanRow = decode_row(Self::KIND, row)?;
        Some(Self {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            subtasks: row.subtasks.unwrap_or_default(),
            priority: row.priority,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl RemoteRecord for Note {
    const KIND: RecordKind = RecordKind::Note;

    fn to_row(&self, owner: &OwnerId) -> RemoteResult<Value> {
        Ok(serde_json::to_value(NoteRow {
            id: self.id,
            user_id: owner.to_string(),
            content: self.content.clone(),
            timestamp: self.timestamp,
            updated_at: self.updated_at,
        })?)
    }

    fn from_row(row: Value) -> Option<Self> {
        let row: NoteRow = decode_row(Self::KIND, row)?;
        Some(Self {
            id: row.id,
            content: row.content,
            timestamp: row.timestamp,
            updated_at: row.updated_at,
        })
    }
}

fn decode_row<T: serde::de::DeserializeOwned>(kind: RecordKind, row: Value) -> Option<T> {
    match serde_json::from_value(row) {
        Ok(row) => Some(row),
        Err(error) => {
            tracing::warn!("Skipping unreadable remote {} row: {}", kind.table(), error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn todo_row_carries_owner_and_snake_case() {
        let day: DayKey = "2024-04-09".parse().unwrap();
        let todo = Todo::new(42, day, "call mom");
        let row = todo.to_row(&OwnerId::new("owner-1")).unwrap();

        assert_eq!(row["user_id"], "owner-1");
        assert_eq!(row["date_key"], "2024-04-09");
        assert!(row.get("dateKey").is_none());
        assert_eq!(Todo::from_row(row), Some(todo));
    }

    #[test]
    fn owner_is_dropped_when_stored_locally() {
        let row = serde_json::json!({
            "id": 1,
            "user_id": "owner-1",
            "content": "hello",
            "timestamp": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        });
        let note = Note::from_row(row).unwrap();
        let local = serde_json::to_value(&note).unwrap();
        assert!(local.get("user_id").is_none());
        assert_eq!(local["updatedAt"], "2024-01-02T00:00:00Z");
    }

    #[test]
    fn legacy_todo_day_key_is_normalized() {
        let row = serde_json::json!({
            "id": 1,
            "user_id": "owner-1",
            "text": "old",
            "date_key": "2023-7-4"
        });
        let todo = Todo::from_row(row).unwrap();
        assert_eq!(todo.date_key.to_string(), "2023-07-04");
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        assert!(Todo::from_row(serde_json::json!({"id": 1})).is_none());
        let bad_day = serde_json::json!({
            "id": 1, "user_id": "o", "text": "x", "date_key": "someday"
        });
        assert!(Todo::from_row(bad_day).is_none());
    }

    #[test]
    fn plan_row_tolerates_null_columns() {
        let row = serde_json::json!({
            "id": 3,
            "user_id": "owner-1",
            "title": "garden",
            "description": null,
            "subtasks": null
        });
        let plan = Plan::from_row(row).unwrap();
        assert_eq!(plan.description, "");
        assert!(plan.subtasks.is_empty());
    }
}
