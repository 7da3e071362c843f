//! Cloud synchronization: merge engine, remote stores and the cycle driver.

mod client;
mod memory;
pub mod merge;
mod orchestrator;
mod postgrest;
mod remote;
mod scheduler;
mod state;

pub use client::{RemoteSnapshot, RemoteSyncClient, UPSERT_BATCH_SIZE};
pub use memory::InMemoryRemoteStore;
pub use merge::{merge_notes, merge_plans, merge_todos, MergeOutcome, SyncRecord};
pub use orchestrator::{SyncError, SyncOrchestrator};
pub use postgrest::PostgrestRemoteStore;
pub use remote::{RemoteError, RemoteResult, RemoteStore};
pub use scheduler::SyncScheduler;
pub use state::{SkipReason, SyncEvent, SyncOutcome, SyncPhase, SyncSummary, SyncTrigger};
