//! Local key-value persistence and the collection adapter built on it.

mod kv;
mod local;
mod sqlite;

pub use kv::{KeyValueStore, KvWrite, MemoryKeyValueStore};
pub use local::{
    day_partition_key, partition_by_day, LocalSnapshot, LocalStore, NOTES_KEY, PLANS_KEY,
    SYNC_CONFLICTS_KEY, TODOS_KEY,
};
pub use sqlite::SqliteKeyValueStore;
