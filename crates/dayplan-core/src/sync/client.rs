//! Typed, batched access to the remote store for one owner.

use serde_json::Value;

use super::remote::{RemoteRecord, RemoteResult, RemoteStore};
use crate::auth::OwnerId;
use crate::models::{Note, Plan, Todo};

/// Largest number of rows sent in a single upsert request.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Everything the remote store holds for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub todos: Vec<Todo>,
    pub plans: Vec<Plan>,
    pub notes: Vec<Note>,
}

pub struct RemoteSyncClient<R> {
    store: R,
}

impl<R: RemoteStore> RemoteSyncClient<R> {
    pub const fn new(store: R) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &R {
        &self.store
    }

    /// Fetch todos, plans and notes. Any failed read fails the whole fetch.
    pub async fn fetch_all(&self, owner: &OwnerId) -> RemoteResult<RemoteSnapshot> {
        let (todos, plans, notes) = tokio::try_join!(
            self.fetch::<Todo>(owner),
            self.fetch::<Plan>(owner),
            self.fetch::<Note>(owner),
        )?;
        Ok(RemoteSnapshot {
            todos,
            plans,
            notes,
        })
    }

    pub async fn upsert_todos(&self, owner: &OwnerId, todos: &[Todo]) -> RemoteResult<()> {
        self.upsert(owner, todos).await
    }

    pub async fn upsert_plans(&self, owner: &OwnerId, plans: &[Plan]) -> RemoteResult<()> {
        self.upsert(owner, plans).await
    }

    pub async fn upsert_notes(&self, owner: &OwnerId, notes: &[Note]) -> RemoteResult<()> {
        self.upsert(owner, notes).await
    }

    async fn fetch<T: RemoteRecord>(&self, owner: &OwnerId) -> RemoteResult<Vec<T>> {
        let rows = self.store.select(T::KIND, owner).await?;
        Ok(rows.into_iter().filter_map(T::from_row).collect())
    }

    /// Send `records` in batches of [`UPSERT_BATCH_SIZE`], stopping at the
    /// first failed batch.
    async fn upsert<T: RemoteRecord>(&self, owner: &OwnerId, records: &[T]) -> RemoteResult<()> {
        let rows = records
            .iter()
            .map(|record| record.to_row(owner))
            .collect::<RemoteResult<Vec<Value>>>()?;

        for (index, batch) in rows.chunks(UPSERT_BATCH_SIZE).enumerate() {
            tracing::debug!(
                "Uploading {} batch {} ({} rows)",
                T::KIND.table(),
                index + 1,
                batch.len()
            );
            if let Err(error) = self.store.upsert(T::KIND, owner, batch.to_vec()).await {
                tracing::warn!(
                    "Upload of {} batch {} failed: {}",
                    T::KIND.table(),
                    index + 1,
                    error
                );
                return Err(error);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayKey, RecordKind};
    use crate::sync::memory::InMemoryRemoteStore;
    use pretty_assertions::assert_eq;

    fn todos(count: i64) -> Vec<Todo> {
        let day: DayKey = "2024-08-01".parse().unwrap();
        (1..=count).map(|id| Todo::new(id, day, format!("todo {id}"))).collect()
    }

    #[tokio::test]
    async fn upserts_are_chunked_into_batches_of_one_hundred() {
        let client = RemoteSyncClient::new(InMemoryRemoteStore::new());
        let owner = OwnerId::new("owner-1");

        client.upsert_todos(&owner, &todos(250)).await.unwrap();
        assert_eq!(client.store().upsert_batches(), vec![100, 100, 50]);
        assert_eq!(client.store().rows(RecordKind::Todo).len(), 250);
    }

    #[tokio::test]
    async fn empty_upsert_sends_nothing() {
        let client = RemoteSyncClient::new(InMemoryRemoteStore::new());
        client
            .upsert_plans(&OwnerId::new("owner-1"), &[])
            .await
            .unwrap();
        assert!(client.store().upsert_batches().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_fails_the_whole_operation() {
        let client = RemoteSyncClient::new(InMemoryRemoteStore::new());
        client.store().fail_upserts_after(Some(1));

        let result = client
            .upsert_todos(&OwnerId::new("owner-1"), &todos(250))
            .await;
        assert!(result.is_err());
        assert_eq!(client.store().upsert_batches(), vec![100, 100]);
    }

    #[tokio::test]
    async fn fetch_all_round_trips_owner_rows() {
        let client = RemoteSyncClient::new(InMemoryRemoteStore::new());
        let owner = OwnerId::new("owner-1");
        let plan = Plan::new(5, "renovate");
        let note = Note::new(9, "remember");

        client.upsert_todos(&owner, &todos(2)).await.unwrap();
        client
            .upsert_plans(&owner, std::slice::from_ref(&plan))
            .await
            .unwrap();
        client
            .upsert_notes(&owner, std::slice::from_ref(&note))
            .await
            .unwrap();

        let snapshot = client.fetch_all(&owner).await.unwrap();
        assert_eq!(snapshot.todos.len(), 2);
        assert_eq!(snapshot.plans, vec![plan]);
        assert_eq!(snapshot.notes, vec![note]);

        let other = client.fetch_all(&OwnerId::new("someone-else")).await.unwrap();
        assert_eq!(other, RemoteSnapshot::default());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let client = RemoteSyncClient::new(InMemoryRemoteStore::new());
        client.store().fail_selects(true);
        assert!(client.fetch_all(&OwnerId::new("owner-1")).await.is_err());
    }
}
