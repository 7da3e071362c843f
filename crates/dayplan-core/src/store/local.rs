//! Collection-level adapter over the key-value store.
//!
//! Layout:
//! - `todos_{YYYY-MM-DD}`: the todos of one day, authoritative for local edits
//! - `todos`: every todo flattened, rewritten whenever a partition changes
//! - `plans`, `notes`: single collections (`notes` newest-first)
//!
//! Reads are lenient: a value that fails to parse is treated as an empty
//! collection and a single undecodable record is skipped.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::kv::{KeyValueStore, KvWrite, MemoryKeyValueStore};
use super::sqlite::SqliteKeyValueStore;
use crate::error::Result;
use crate::models::{DayKey, Note, Plan, SyncConflict, Todo};

pub const TODOS_KEY: &str = "todos";
pub const PLANS_KEY: &str = "plans";
pub const NOTES_KEY: &str = "notes";
pub const SYNC_CONFLICTS_KEY: &str = "sync_conflicts";

const DAY_PARTITION_PREFIX: &str = "todos_";
const MAX_STORED_CONFLICTS: usize = 100;

/// Storage key of the partition holding `day`'s todos.
pub fn day_partition_key(day: DayKey) -> String {
    format!("{DAY_PARTITION_PREFIX}{day}")
}

/// Group todos by owning day, keeping their relative order within each day.
pub fn partition_by_day(todos: &[Todo]) -> BTreeMap<DayKey, Vec<Todo>> {
    let mut days: BTreeMap<DayKey, Vec<Todo>> = BTreeMap::new();
    for todo in todos {
        days.entry(todo.date_key).or_default().push(todo.clone());
    }
    days
}

fn flatten(days: BTreeMap<DayKey, Vec<Todo>>) -> Vec<Todo> {
    days.into_values().flatten().collect()
}

/// Raw copy of every sync-managed key, taken before a sync cycle mutates
/// anything. `None` records a key that was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSnapshot {
    entries: BTreeMap<String, Option<String>>,
}

impl LocalSnapshot {
    pub fn len(&self) -> usize {
        self.entries.values().filter(|value| value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads and writes todo/plan/note collections.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Arc::new(kv) }
    }

    /// Open a SQLite-backed store and upgrade legacy day keys.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(SqliteKeyValueStore::open(path)?);
        let migrated = store.migrate_legacy_day_keys()?;
        if migrated > 0 {
            tracing::info!("Migrated {} legacy day partitions", migrated);
        }
        Ok(store)
    }

    /// Open a volatile store (primarily for tests).
    pub fn in_memory() -> Self {
        Self::new(MemoryKeyValueStore::new())
    }

    pub fn read_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let raw = self.kv.get(name)?;
        Ok(decode_records(name, raw.as_deref(), None))
    }

    pub fn write_collection<T: Serialize>(&self, name: &str, records: &[T]) -> Result<()> {
        self.kv.set(name, &serde_json::to_string(records)?)
    }

    pub fn plans(&self) -> Result<Vec<Plan>> {
        self.read_collection(PLANS_KEY)
    }

    pub fn write_plans(&self, plans: &[Plan]) -> Result<()> {
        self.write_collection(PLANS_KEY, plans)
    }

    pub fn notes(&self) -> Result<Vec<Note>> {
        self.read_collection(NOTES_KEY)
    }

    pub fn write_notes(&self, notes: &[Note]) -> Result<()> {
        self.write_collection(NOTES_KEY, notes)
    }

    pub fn read_todos_for_day(&self, day: DayKey) -> Result<Vec<Todo>> {
        let key = day_partition_key(day);
        let raw = self.kv.get(&key)?;
        Ok(decode_records(&key, raw.as_deref(), Some(day)))
    }

    /// Overwrite one day's partition and refresh the flattened view in the
    /// same batch. Todos whose `date_key` differs from `day` are rejected.
    pub fn write_todos_for_day(&self, day: DayKey, todos: &[Todo]) -> Result<()> {
        if let Some(stray) = todos.iter().find(|todo| todo.date_key != day) {
            return Err(crate::Error::InvalidInput(format!(
                "todo {} belongs to {}, not {}",
                stray.id, stray.date_key, day
            )));
        }

        let mut days = self.read_partitions()?;
        if todos.is_empty() {
            days.remove(&day);
        } else {
            days.insert(day, todos.to_vec());
        }

        let mut writes = Vec::with_capacity(2);
        let key = day_partition_key(day);
        if todos.is_empty() {
            writes.push(KvWrite::remove(key));
        } else {
            writes.push(KvWrite::set(key, serde_json::to_string(todos)?));
        }
        writes.push(KvWrite::set(
            TODOS_KEY,
            serde_json::to_string(&flatten(days))?,
        ));
        self.kv.apply(&writes)
    }

    /// Days that currently have a partition, ascending.
    pub fn days_with_todos(&self) -> Result<Vec<DayKey>> {
        Ok(self.partition_keys()?.into_keys().collect())
    }

    /// Every local todo, read from the day partitions, ordered by day.
    pub fn read_all_todos(&self) -> Result<Vec<Todo>> {
        Ok(flatten(self.read_partitions()?))
    }

    /// Replace every todo with `todos`: rewrite the flattened view, overwrite
    /// each affected partition and drop partitions no longer referenced.
    pub fn replace_all_todos(&self, todos: &[Todo]) -> Result<()> {
        let writes = self.todo_writes(todos)?;
        self.kv.apply(&writes)
    }

    /// Persist merged todos, plans and notes as one atomic batch.
    pub fn persist_all(&self, todos: &[Todo], plans: &[Plan], notes: &[Note]) -> Result<()> {
        let mut writes = self.todo_writes(todos)?;
        writes.push(KvWrite::set(PLANS_KEY, serde_json::to_string(plans)?));
        writes.push(KvWrite::set(NOTES_KEY, serde_json::to_string(notes)?));
        self.kv.apply(&writes)
    }

    /// Capture the raw value of every sync-managed key.
    pub fn snapshot(&self) -> Result<LocalSnapshot> {
        let mut entries = BTreeMap::new();
        for key in [TODOS_KEY, PLANS_KEY, NOTES_KEY] {
            entries.insert(key.to_string(), self.kv.get(key)?);
        }
        for key in self.all_partition_keys()? {
            let value = self.kv.get(&key)?;
            entries.insert(key, value);
        }
        Ok(LocalSnapshot { entries })
    }

    /// Put every sync-managed key back exactly as captured, removing day
    /// partitions created after the snapshot.
    pub fn restore(&self, snapshot: &LocalSnapshot) -> Result<()> {
        let mut writes = Vec::with_capacity(snapshot.entries.len());
        for key in self.all_partition_keys()? {
            if !snapshot.entries.contains_key(&key) {
                writes.push(KvWrite::remove(key));
            }
        }
        for (key, value) in &snapshot.entries {
            writes.push(match value {
                Some(value) => KvWrite::set(key.clone(), value.clone()),
                None => KvWrite::remove(key.clone()),
            });
        }
        self.kv.apply(&writes)
    }

    /// Rewrite unpadded `todos_YYYY-M-D` partitions under the padded key,
    /// merging with any padded partition that already exists. Returns the
    /// number of legacy keys removed.
    pub fn migrate_legacy_day_keys(&self) -> Result<usize> {
        let legacy: Vec<(String, DayKey)> = self
            .kv
            .keys()?
            .into_iter()
            .filter_map(|key| {
                let suffix = key.strip_prefix(DAY_PARTITION_PREFIX)?;
                if DayKey::is_canonical(suffix) {
                    return None;
                }
                let day = suffix.parse::<DayKey>().ok()?;
                Some((key, day))
            })
            .collect();

        if legacy.is_empty() {
            return Ok(0);
        }

        let mut days = self.read_partitions()?;
        for (key, day) in &legacy {
            let raw = self.kv.get(key)?;
            let legacy_todos: Vec<Todo> = decode_records(key, raw.as_deref(), Some(*day));
            let current = days.remove(day).unwrap_or_default();
            let merged = crate::sync::merge::merge_todos(&legacy_todos, &current).records;
            days.insert(*day, merged);
        }

        // Legacy keys are not canonical partitions, so these writes drop them.
        let writes = self.todo_writes(&flatten(days))?;
        self.kv.apply(&writes)?;
        Ok(legacy.len())
    }

    /// Prepend resolved conflicts to the stored log, keeping the newest 100.
    pub fn record_conflicts(&self, conflicts: &[SyncConflict]) -> Result<()> {
        if conflicts.is_empty() {
            return Ok(());
        }
        let mut log: Vec<SyncConflict> = conflicts.to_vec();
        log.extend(self.read_collection::<SyncConflict>(SYNC_CONFLICTS_KEY)?);
        log.truncate(MAX_STORED_CONFLICTS);
        self.write_collection(SYNC_CONFLICTS_KEY, &log)
    }

    pub fn recent_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut log: Vec<SyncConflict> = self.read_collection(SYNC_CONFLICTS_KEY)?;
        log.truncate(limit);
        Ok(log)
    }

    fn todo_writes(&self, todos: &[Todo]) -> Result<Vec<KvWrite>> {
        let days = partition_by_day(todos);
        let mut writes = Vec::with_capacity(days.len() + 1);

        for key in self.all_partition_keys()? {
            let still_used = key
                .strip_prefix(DAY_PARTITION_PREFIX)
                .filter(|suffix| DayKey::is_canonical(suffix))
                .and_then(|suffix| suffix.parse::<DayKey>().ok())
                .is_some_and(|day| days.contains_key(&day));
            if !still_used {
                writes.push(KvWrite::remove(key));
            }
        }
        for (day, day_todos) in &days {
            writes.push(KvWrite::set(
                day_partition_key(*day),
                serde_json::to_string(day_todos)?,
            ));
        }
        writes.push(KvWrite::set(
            TODOS_KEY,
            serde_json::to_string(&flatten(days))?,
        ));
        Ok(writes)
    }

    fn read_partitions(&self) -> Result<BTreeMap<DayKey, Vec<Todo>>> {
        let mut days: BTreeMap<DayKey, Vec<Todo>> = BTreeMap::new();
        for (day, key) in self.partition_keys()? {
            let raw = self.kv.get(&key)?;
            let todos: Vec<Todo> = decode_records(&key, raw.as_deref(), Some(day));
            if !todos.is_empty() {
                days.entry(day).or_default().extend(todos);
            }
        }
        Ok(days)
    }

    /// Canonical partitions only, keyed by day.
    fn partition_keys(&self) -> Result<BTreeMap<DayKey, String>> {
        Ok(self
            .all_partition_keys()?
            .into_iter()
            .filter_map(|key| {
                let suffix = key.strip_prefix(DAY_PARTITION_PREFIX)?;
                if !DayKey::is_canonical(suffix) {
                    return None;
                }
                let day = suffix.parse::<DayKey>().ok()?;
                Some((day, key))
            })
            .collect())
    }

    /// Every `todos_*` key, legacy or not.
    fn all_partition_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(DAY_PARTITION_PREFIX))
            .collect())
    }
}

/// Decode a stored JSON array, skipping what cannot be read.
///
/// When `day` is given, records missing `dateKey` inherit it.
fn decode_records<T: DeserializeOwned>(
    key: &str,
    raw: Option<&str>,
    day: Option<DayKey>,
) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let values = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(values) => values,
        Err(error) => {
            tracing::warn!("Ignoring malformed local value for '{}': {}", key, error);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|mut value| {
            if let (Some(day), Some(object)) = (day, value.as_object_mut()) {
                object
                    .entry("dateKey")
                    .or_insert_with(|| Value::String(day.to_string()));
            }
            match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!("Skipping unreadable record in '{}': {}", key, error);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subtask;
    use pretty_assertions::assert_eq;

    fn day(raw: &str) -> DayKey {
        raw.parse().unwrap()
    }

    fn todo(id: i64, date: &str) -> Todo {
        Todo::new(id, day(date), format!("todo {id}"))
    }

    #[test]
    fn malformed_json_reads_as_empty() {
        let kv = MemoryKeyValueStore::new();
        kv.set(PLANS_KEY, "{not json").unwrap();
        kv.set(NOTES_KEY, r#"[{"id":1,"content":"ok"},{"id":"bad"}]"#)
            .unwrap();
        let store = LocalStore::new(kv);

        assert!(store.plans().unwrap().is_empty());
        let notes = store.notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "ok");
    }

    #[test]
    fn day_partition_fills_missing_date_key() {
        let kv = MemoryKeyValueStore::new();
        kv.set("todos_2024-03-05", r#"[{"id":1,"text":"legacy","completed":true}]"#)
            .unwrap();
        let store = LocalStore::new(kv);

        let todos = store.read_todos_for_day(day("2024-03-05")).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].date_key, day("2024-03-05"));
        assert!(todos[0].completed);
    }

    #[test]
    fn write_todos_for_day_keeps_flattened_view_in_step() {
        let store = LocalStore::in_memory();
        let monday = day("2024-05-06");
        let tuesday = day("2024-05-07");

        store
            .write_todos_for_day(monday, &[todo(1, "2024-05-06")])
            .unwrap();
        store
            .write_todos_for_day(tuesday, &[todo(2, "2024-05-07")])
            .unwrap();
        let flattened: Vec<Todo> = store.read_collection(TODOS_KEY).unwrap();
        assert_eq!(flattened.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

        store.write_todos_for_day(monday, &[]).unwrap();
        let flattened: Vec<Todo> = store.read_collection(TODOS_KEY).unwrap();
        assert_eq!(flattened.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(store.days_with_todos().unwrap(), vec![tuesday]);
    }

    #[test]
    fn write_todos_for_day_rejects_foreign_todos() {
        let store = LocalStore::in_memory();
        let result = store.write_todos_for_day(day("2024-05-06"), &[todo(1, "2024-05-07")]);
        assert!(result.is_err());
    }

    #[test]
    fn replace_all_todos_drops_stale_partitions() {
        let store = LocalStore::in_memory();
        store
            .replace_all_todos(&[todo(1, "2024-01-01"), todo(2, "2024-01-02")])
            .unwrap();
        store.replace_all_todos(&[todo(2, "2024-01-02")]).unwrap();

        assert!(store.read_todos_for_day(day("2024-01-01")).unwrap().is_empty());
        assert_eq!(store.days_with_todos().unwrap(), vec![day("2024-01-02")]);
    }

    #[test]
    fn partition_then_flatten_is_identity() {
        let todos = vec![
            todo(3, "2024-02-01"),
            todo(1, "2024-01-31"),
            todo(2, "2024-02-01"),
        ];
        let mut flattened = flatten(partition_by_day(&todos));
        let mut expected = todos;
        flattened.sort_by_key(|t| t.id);
        expected.sort_by_key(|t| t.id);
        assert_eq!(flattened, expected);
    }

    #[test]
    fn restore_returns_every_key_to_snapshot() {
        let store = LocalStore::in_memory();
        store.replace_all_todos(&[todo(1, "2024-01-01")]).unwrap();
        store.write_plans(&[Plan::new(1, "plan")]).unwrap();
        let before = store.snapshot().unwrap();

        let mut plan = Plan::new(2, "other");
        plan.subtasks.push(Subtask::new(1, "step"));
        store
            .persist_all(&[todo(5, "2024-06-01")], &[plan], &[Note::new(1, "n")])
            .unwrap();
        assert_ne!(store.snapshot().unwrap(), before);

        store.restore(&before).unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
        assert!(store.notes().unwrap().is_empty());
        assert!(store.read_todos_for_day(day("2024-06-01")).unwrap().is_empty());
    }

    #[test]
    fn migrates_unpadded_partitions() {
        let kv = MemoryKeyValueStore::new();
        kv.set("todos_2024-3-5", r#"[{"id":1,"text":"old"}]"#).unwrap();
        kv.set(
            "todos_2024-03-05",
            r#"[{"id":2,"text":"new","dateKey":"2024-03-05"}]"#,
        )
        .unwrap();
        let store = LocalStore::new(kv);

        assert_eq!(store.migrate_legacy_day_keys().unwrap(), 1);
        let ids: Vec<i64> = store
            .read_todos_for_day(day("2024-03-05"))
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.migrate_legacy_day_keys().unwrap(), 0);
        assert_eq!(store.read_all_todos().unwrap().len(), 2);
    }

    #[test]
    fn conflict_log_is_capped_and_newest_first() {
        use crate::models::{ConflictResolution, RecordKind};

        let store = LocalStore::in_memory();
        let conflict = |id| SyncConflict {
            kind: RecordKind::Note,
            record_id: id,
            local_updated_at: None,
            remote_updated_at: None,
            resolution: ConflictResolution::LocalWins,
            resolved_at: chrono::Utc::now(),
        };
        let first: Vec<SyncConflict> = (0..80).map(conflict).collect();
        let second: Vec<SyncConflict> = (80..120).map(conflict).collect();
        store.record_conflicts(&first).unwrap();
        store.record_conflicts(&second).unwrap();

        let all = store.recent_conflicts(usize::MAX).unwrap();
        assert_eq!(all.len(), MAX_STORED_CONFLICTS);
        assert_eq!(all[0].record_id, 80);
        assert_eq!(store.recent_conflicts(3).unwrap().len(), 3);
    }
}
