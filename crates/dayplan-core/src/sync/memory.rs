//! In-memory [`RemoteStore`] for tests and offline development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::auth::OwnerId;
use crate::models::RecordKind;

#[derive(Debug, Default)]
struct State {
    tables: HashMap<RecordKind, BTreeMap<i64, Value>>,
    fail_selects: bool,
    /// Upsert calls that succeed before every further call fails.
    upserts_before_failure: Option<usize>,
    select_calls: usize,
    upsert_calls: Vec<usize>,
    latency: Option<Duration>,
}

/// Tables held in process, with failure injection.
///
/// Rows are keyed by `id` per table like a primary key; upserting an id
/// owned by someone else is rejected.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RemoteResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|error| RemoteError::Unavailable(error.to_string()))
    }

    /// Make every select fail (`true`) or succeed again (`false`).
    pub fn fail_selects(&self, fail: bool) {
        if let Ok(mut state) = self.state() {
            state.fail_selects = fail;
        }
    }

    /// Let `successes` upsert calls through, then fail the rest.
    pub fn fail_upserts_after(&self, successes: Option<usize>) {
        if let Ok(mut state) = self.state() {
            state.upserts_before_failure = successes;
        }
    }

    /// Delay every call, to widen the window in which a cycle is in flight.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state() {
            state.latency = latency;
        }
    }

    /// Seed rows directly, bypassing failure injection.
    pub fn insert_rows(&self, kind: RecordKind, rows: impl IntoIterator<Item = Value>) {
        if let Ok(mut state) = self.state() {
            let table = state.tables.entry(kind).or_default();
            for row in rows {
                if let Some(id) = row.get("id").and_then(Value::as_i64) {
                    table.insert(id, row);
                }
            }
        }
    }

    /// All rows of a table regardless of owner, ordered by id.
    pub fn rows(&self, kind: RecordKind) -> Vec<Value> {
        self.state()
            .map(|state| {
                state
                    .tables
                    .get(&kind)
                    .map(|table| table.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn select_calls(&self) -> usize {
        self.state().map(|state| state.select_calls).unwrap_or_default()
    }

    /// Row count of every upsert call, in call order.
    pub fn upsert_batches(&self) -> Vec<usize> {
        self.state()
            .map(|state| state.upsert_calls.clone())
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) -> RemoteResult<()> {
        let latency = self.state()?.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

fn updated_at(row: &Value) -> &str {
    row.get("updated_at").and_then(Value::as_str).unwrap_or("")
}

impl RemoteStore for InMemoryRemoteStore {
    async fn select(&self, kind: RecordKind, owner: &OwnerId) -> RemoteResult<Vec<Value>> {
        self.simulate_latency().await?;
        let mut state = self.state()?;
        state.select_calls += 1;
        if state.fail_selects {
            return Err(RemoteError::Unavailable("injected select failure".to_string()));
        }

        let mut rows: Vec<Value> = state
            .tables
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(owner.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // RFC 3339 UTC strings sort chronologically.
        rows.sort_by(|a, b| updated_at(b).cmp(updated_at(a)));
        Ok(rows)
    }

    async fn upsert(&self, kind: RecordKind, owner: &OwnerId, rows: Vec<Value>) -> RemoteResult<()> {
        self.simulate_latency().await?;
        let mut state = self.state()?;
        let call_index = state.upsert_calls.len();
        state.upsert_calls.push(rows.len());
        if state
            .upserts_before_failure
            .is_some_and(|successes| call_index >= successes)
        {
            return Err(RemoteError::Unavailable("injected upsert failure".to_string()));
        }

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| RemoteError::Api("row is missing an integer id".to_string()))?;
            if row.get("user_id").and_then(Value::as_str) != Some(owner.as_str()) {
                return Err(RemoteError::Api(format!("row {id} is not owned by {owner}")));
            }
            keyed.push((id, row));
        }

        let table = state.tables.entry(kind).or_default();
        if let Some((id, _)) = keyed.iter().find(|(id, _)| {
            table
                .get(id)
                .and_then(|existing| existing.get("user_id"))
                .and_then(Value::as_str)
                .is_some_and(|existing_owner| existing_owner != owner.as_str())
        }) {
            return Err(RemoteError::Api(format!(
                "row {id} in {} belongs to another owner",
                kind.table()
            )));
        }
        table.extend(keyed);
        Ok(())
    }
}
