//! Background trigger loop for the sync orchestrator.
//!
//! Cycles start on a fixed interval, on every sign-in, and on explicit
//! request. Shutting down waits for running cycles and then runs one last
//! cycle. Each trigger spawns its own cycle, so triggers that land while
//! another cycle is running hit the orchestrator's in-flight guard and are
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use super::orchestrator::SyncOrchestrator;
use super::remote::RemoteStore;
use super::state::{SyncOutcome, SyncTrigger};
use crate::auth::{AuthStateChange, OwnerProvider};

const COMMAND_CAPACITY: usize = 8;

enum Command {
    SyncNow(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<bool>),
}

pub struct SyncScheduler {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    pub fn spawn<R, A>(
        orchestrator: Arc<SyncOrchestrator<R, A>>,
        interval: Duration,
        auth_events: broadcast::Receiver<AuthStateChange>,
    ) -> Self
    where
        R: RemoteStore + 'static,
        A: OwnerProvider + 'static,
    {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let task = tokio::spawn(run(orchestrator, interval, auth_events, receiver));
        Self { commands, task }
    }

    /// Request a cycle and wait for its result.
    pub async fn sync_now(&self) -> bool {
        let (reply, result) = oneshot::channel();
        if self.commands.send(Command::SyncNow(reply)).await.is_err() {
            return false;
        }
        result.await.unwrap_or(false)
    }

    /// Stop the loop after a final cycle. Returns whether that cycle succeeded.
    pub async fn shutdown(self) -> bool {
        let (reply, result) = oneshot::channel();
        let succeeded = if self.commands.send(Command::Shutdown(reply)).await.is_ok() {
            result.await.unwrap_or(false)
        } else {
            false
        };
        if let Err(error) = self.task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {}", error);
        }
        succeeded
    }
}

async fn run<R, A>(
    orchestrator: Arc<SyncOrchestrator<R, A>>,
    interval: Duration,
    mut auth_events: broadcast::Receiver<AuthStateChange>,
    mut commands: mpsc::Receiver<Command>,
) where
    R: RemoteStore + 'static,
    A: OwnerProvider + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = JoinSet::new();
    let mut auth_open = true;

    tracing::debug!("Sync scheduler started with a {:?} interval", interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                spawn_cycle(&mut cycles, &orchestrator, SyncTrigger::Interval, None);
            }
            event = auth_events.recv(), if auth_open => match event {
                Ok(AuthStateChange::SignedIn(owner)) => {
                    tracing::debug!("{} signed in, scheduling sync", owner);
                    spawn_cycle(&mut cycles, &orchestrator, SyncTrigger::Login, None);
                }
                Ok(AuthStateChange::SignedOut) => {
                    tracing::debug!("Signed out, interval syncs will be skipped");
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} auth events", missed);
                }
                Err(RecvError::Closed) => auth_open = false,
            },
            Some(_) = cycles.join_next(), if !cycles.is_empty() => {}
            command = commands.recv() => match command {
                Some(Command::SyncNow(reply)) => {
                    spawn_cycle(&mut cycles, &orchestrator, SyncTrigger::Manual, Some(reply));
                }
                Some(Command::Shutdown(reply)) => {
                    while cycles.join_next().await.is_some() {}
                    let outcome = orchestrator.run_cycle(SyncTrigger::Teardown).await;
                    let _ = reply.send(outcome.is_success());
                    break;
                }
                None => break,
            },
        }
    }
    cycles.shutdown().await;
    tracing::debug!("Sync scheduler stopped");
}

fn spawn_cycle<R, A>(
    cycles: &mut JoinSet<()>,
    orchestrator: &Arc<SyncOrchestrator<R, A>>,
    trigger: SyncTrigger,
    reply: Option<oneshot::Sender<bool>>,
) where
    R: RemoteStore + 'static,
    A: OwnerProvider + 'static,
{
    let orchestrator = Arc::clone(orchestrator);
    cycles.spawn(async move {
        let outcome = orchestrator.run_cycle(trigger).await;
        if let SyncOutcome::Skipped(reason) = &outcome {
            tracing::debug!("{} sync skipped: {:?}", trigger, reason);
        }
        if let Some(reply) = reply {
            let _ = reply.send(outcome.is_success());
        }
    });
}
