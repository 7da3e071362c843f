//! Synchronization orchestrator.
//!
//! One cycle backs up the local collections, pulls the owner's remote
//! records, merges each collection, persists the result locally and pushes
//! it back with upserts. A failure while pulling, persisting or pushing
//! restores the backup verbatim. Only one cycle runs at a time; triggers
//! that arrive mid-cycle are dropped.

use thiserror::Error;
use tokio::sync::{broadcast, watch};

use super::client::RemoteSyncClient;
use super::merge::{merge_notes, merge_plans, merge_todos};
use super::remote::{RemoteError, RemoteStore};
use super::state::{SkipReason, SyncEvent, SyncOutcome, SyncPhase, SyncSummary, SyncTrigger};
use crate::auth::{OwnerId, OwnerProvider};
use crate::models::{Note, Plan, Todo};
use crate::store::{LocalStore, TODOS_KEY};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Local(#[from] crate::Error),
}

/// Typed local collections captured during `BackingUp`.
struct LocalCollections {
    todos: Vec<Todo>,
    plans: Vec<Plan>,
    notes: Vec<Note>,
}

/// Puts the phase back to `Idle` however the cycle ends.
struct IdleOnDrop<'a>(&'a watch::Sender<SyncPhase>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncPhase::Idle);
    }
}

pub struct SyncOrchestrator<R, A> {
    local: LocalStore,
    remote: RemoteSyncClient<R>,
    owners: A,
    phase: watch::Sender<SyncPhase>,
    events: broadcast::Sender<SyncEvent>,
}

impl<R: RemoteStore, A: OwnerProvider> SyncOrchestrator<R, A> {
    pub fn new(local: LocalStore, remote: R, owners: A) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            local,
            remote: RemoteSyncClient::new(remote),
            owners,
            phase,
            events,
        }
    }

    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    pub const fn remote(&self) -> &RemoteSyncClient<R> {
        &self.remote
    }

    pub const fn owners(&self) -> &A {
        &self.owners
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Receive a [`SyncEvent::Completed`] after every successful cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run one explicit cycle. Never errors: `false` covers a missing owner,
    /// a cycle already in flight and every failure.
    pub async fn sync(&self) -> bool {
        self.run_cycle(SyncTrigger::Manual).await.is_success()
    }

    pub async fn run_cycle(&self, trigger: SyncTrigger) -> SyncOutcome {
        let claimed = self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Idle {
                *phase = SyncPhase::BackingUp;
                true
            } else {
                false
            }
        });
        if !claimed {
            tracing::debug!("Ignoring {} sync trigger: a cycle is already running", trigger);
            return SyncOutcome::Skipped(SkipReason::InFlight);
        }
        let _idle = IdleOnDrop(&self.phase);

        let Some(owner) = self.owners.current_owner().await else {
            tracing::debug!("Skipping {} sync: no authenticated owner", trigger);
            return SyncOutcome::Skipped(SkipReason::Unauthenticated);
        };
        tracing::info!("Starting {} sync for {}", trigger, owner);

        let backup = match self.back_up() {
            Ok(backup) => backup,
            Err(error) => {
                tracing::warn!("Sync aborted, could not read local state: {}", error);
                return SyncOutcome::Failed {
                    phase: SyncPhase::BackingUp,
                    message: error.to_string(),
                };
            }
        };
        let (snapshot, collections) = backup;

        match self.run_phases(&owner, collections).await {
            Ok(summary) => {
                self.enter(SyncPhase::Done);
                if let Err(error) = self.local.record_conflicts(&summary.conflicts) {
                    tracing::warn!("Could not record sync conflicts: {}", error);
                }
                tracing::info!(
                    "Sync finished: {} todos, {} plans, {} notes ({} pulled, {} pushed, {} conflicts)",
                    summary.todos,
                    summary.plans,
                    summary.notes,
                    summary.pulled_new,
                    summary.pushed_new,
                    summary.conflicts.len()
                );
                // No subscribers is fine.
                let _ = self.events.send(SyncEvent::Completed);
                SyncOutcome::Completed(summary)
            }
            Err(error) => {
                let phase = self.phase();
                tracing::warn!("Sync failed while {}: {}", phase, error);
                if phase.needs_rollback() {
                    self.enter(SyncPhase::RollingBack);
                    match self.local.restore(&snapshot) {
                        Ok(()) => tracing::info!("Restored local state from pre-sync backup"),
                        Err(restore_error) => {
                            tracing::error!("Failed to restore local backup: {}", restore_error);
                        }
                    }
                }
                SyncOutcome::Failed {
                    phase,
                    message: error.to_string(),
                }
            }
        }
    }

    fn enter(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    fn back_up(&self) -> crate::Result<(crate::store::LocalSnapshot, LocalCollections)> {
        let snapshot = self.local.snapshot()?;
        // Older writers only kept the flattened view; partitions win on ties.
        let flattened: Vec<Todo> = self.local.read_collection(TODOS_KEY)?;
        let partitioned = self.local.read_all_todos()?;
        let collections = LocalCollections {
            todos: merge_todos(&flattened, &partitioned).records,
            plans: self.local.plans()?,
            notes: self.local.notes()?,
        };
        Ok((snapshot, collections))
    }

    async fn run_phases(
        &self,
        owner: &OwnerId,
        local: LocalCollections,
    ) -> Result<SyncSummary, SyncError> {
        self.enter(SyncPhase::Pulling);
        let remote = self.remote.fetch_all(owner).await?;

        self.enter(SyncPhase::Merging);
        let todos = merge_todos(&remote.todos, &local.todos);
        let plans = merge_plans(&remote.plans, &local.plans);
        let notes = merge_notes(&remote.notes, &local.notes);

        self.enter(SyncPhase::PersistingLocal);
        self.local
            .persist_all(&todos.records, &plans.records, &notes.records)?;

        self.enter(SyncPhase::Pushing);
        self.remote.upsert_todos(owner, &todos.records).await?;
        self.remote.upsert_plans(owner, &plans.records).await?;
        self.remote.upsert_notes(owner, &notes.records).await?;

        let mut conflicts = todos.conflicts;
        conflicts.extend(plans.conflicts);
        conflicts.extend(notes.conflicts);
        Ok(SyncSummary {
            todos: todos.records.len(),
            plans: plans.records.len(),
            notes: notes.records.len(),
            pulled_new: todos.remote_only + plans.remote_only + notes.remote_only,
            pushed_new: todos.local_only + plans.local_only + notes.local_only,
            conflicts,
        })
    }
}
