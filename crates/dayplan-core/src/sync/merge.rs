//! Record merge engine.
//!
//! Reconciles the remote and local versions of one collection by identity
//! and recency. The remote side seeds the result; each local record is then
//! inserted when new, or replaces the remote record when its `updatedAt` is
//! not older. A missing timestamp on either side lets the local record win
//! so writes made before timestamps existed are never discarded.
//!
//! Merging never drops a record that exists on only one side and never
//! touches its inputs.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{ConflictResolution, DayKey, Note, Plan, RecordKind, SyncConflict, Todo};

/// A record that can be reconciled between local and remote copies.
pub trait SyncRecord: Clone + PartialEq {
    /// Identity within one collection.
    type Key: Ord + Clone;

    const KIND: RecordKind;

    fn merge_key(&self) -> Self::Key;

    fn record_id(&self) -> i64;

    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

impl SyncRecord for Todo {
    // Day first, so equal ids on different days never collide.
    type Key = (DayKey, i64);

    const KIND: RecordKind = RecordKind::Todo;

    fn merge_key(&self) -> Self::Key {
        (self.date_key, self.id)
    }

    fn record_id(&self) -> i64 {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl SyncRecord for Plan {
    type Key = i64;

    const KIND: RecordKind = RecordKind::Plan;

    fn merge_key(&self) -> Self::Key {
        self.id
    }

    fn record_id(&self) -> i64 {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl SyncRecord for Note {
    type Key = i64;

    const KIND: RecordKind = RecordKind::Note;

    fn merge_key(&self) -> Self::Key {
        self.id
    }

    fn record_id(&self) -> i64 {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Merged collection plus what happened while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome<T> {
    pub records: Vec<T>,
    /// Records present on both sides with different content.
    pub conflicts: Vec<SyncConflict>,
    pub local_only: usize,
    pub remote_only: usize,
}

/// Whether the local copy replaces the remote one.
///
/// Equal timestamps go to local, the side applied second.
fn local_wins(remote: Option<DateTime<Utc>>, local: Option<DateTime<Utc>>) -> bool {
    match (remote, local) {
        (Some(remote), Some(local)) => local >= remote,
        _ => true,
    }
}

/// Merge `local` into `remote`, returning records in key order.
pub fn merge<T: SyncRecord>(remote: &[T], local: &[T]) -> MergeOutcome<T> {
    let resolved_at = crate::util::now();
    let mut merged: BTreeMap<T::Key, T> = BTreeMap::new();
    for record in remote {
        merged.insert(record.merge_key(), record.clone());
    }
    let remote_keys = merged.len();

    let mut conflicts = Vec::new();
    let mut local_only = 0;
    let mut matched = 0;
    for record in local {
        let key = record.merge_key();
        let Some(existing) = merged.get(&key) else {
            merged.insert(key, record.clone());
            local_only += 1;
            continue;
        };

        matched += 1;
        let local_won = local_wins(existing.updated_at(), record.updated_at());
        if existing != record {
            conflicts.push(SyncConflict {
                kind: T::KIND,
                record_id: record.record_id(),
                local_updated_at: record.updated_at(),
                remote_updated_at: existing.updated_at(),
                resolution: if local_won {
                    ConflictResolution::LocalWins
                } else {
                    ConflictResolution::RemoteWins
                },
                resolved_at,
            });
        }
        if local_won {
            merged.insert(key, record.clone());
        }
    }

    MergeOutcome {
        records: merged.into_values().collect(),
        conflicts,
        local_only,
        remote_only: remote_keys.saturating_sub(matched),
    }
}

/// Todos come back ordered by owning day, then id.
///
/// The remote table keys todos by id alone, so a local todo whose id is
/// already used on another day gets a fresh id and a new `updatedAt`.
pub fn merge_todos(remote: &[Todo], local: &[Todo]) -> MergeOutcome<Todo> {
    let mut outcome = merge(remote, local);
    if reassign_colliding_ids(&mut outcome.records, remote) {
        outcome.records.sort_by_key(|todo| todo.merge_key());
    }
    outcome
}

/// Give every todo id exactly one day. Ids held by remote records keep their
/// day; later local holders are renumbered. Returns whether any id changed.
fn reassign_colliding_ids(todos: &mut [Todo], remote: &[Todo]) -> bool {
    let remote_keys: HashSet<(DayKey, i64)> =
        remote.iter().map(|todo| todo.merge_key()).collect();
    let mut in_use: HashSet<i64> = todos.iter().map(|todo| todo.id).collect();
    let mut claimed: HashSet<i64> = todos
        .iter()
        .filter(|todo| remote_keys.contains(&todo.merge_key()))
        .map(|todo| todo.id)
        .collect();

    let mut changed = false;
    for todo in todos.iter_mut() {
        if remote_keys.contains(&todo.merge_key()) || claimed.insert(todo.id) {
            continue;
        }
        let id = crate::util::next_record_id(in_use.iter().copied());
        tracing::warn!(
            old_id = todo.id,
            new_id = id,
            day = %todo.date_key,
            "todo id already used on another day; renumbering"
        );
        todo.id = id;
        todo.touch();
        in_use.insert(id);
        claimed.insert(id);
        changed = true;
    }
    changed
}

/// Plans come back in creation order.
pub fn merge_plans(remote: &[Plan], local: &[Plan]) -> MergeOutcome<Plan> {
    merge(remote, local)
}

/// Notes come back newest-first.
pub fn merge_notes(remote: &[Note], local: &[Note]) -> MergeOutcome<Note> {
    let mut outcome = merge(remote, local);
    outcome.records.reverse();
    outcome
}
