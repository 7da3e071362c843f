use std::sync::Arc;

use dayplan_core::config::AppConfig;
use dayplan_core::store::LocalStore;
use dayplan_core::auth::OwnerProvider;
use dayplan_core::sync::{
    RemoteStore, SkipReason, SyncEvent, SyncOrchestrator, SyncOutcome, SyncScheduler,
    SyncSummary, SyncTrigger,
};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::SyncCommands;
use crate::commands::common::{
    build_orchestrator, format_sync_conflict_lines, format_timestamp, open_store,
    sync_conflict_to_item, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync_command(
    command: Option<SyncCommands>,
    config: &AppConfig,
) -> Result<(), CliError> {
    match command {
        None => run_sync(config).await,
        Some(SyncCommands::Watch) => run_sync_watch(config).await,
        Some(SyncCommands::Conflicts { limit, json }) => {
            run_sync_conflicts(limit, json, &open_store(config)?)
        }
    }
}

pub async fn run_sync(config: &AppConfig) -> Result<(), CliError> {
    let (orchestrator, _client) = build_orchestrator(config)?;
    let outcome = orchestrator.run_cycle(SyncTrigger::Manual).await;
    println!("{}", outcome_message(outcome)?);
    Ok(())
}

/// Run the cycle that follows a successful sign-in.
pub async fn sync_after_login<R: RemoteStore, A: OwnerProvider>(
    orchestrator: &SyncOrchestrator<R, A>,
) -> Result<String, CliError> {
    outcome_message(orchestrator.run_cycle(SyncTrigger::Login).await)
}

/// Sync on the configured interval until Ctrl-C, then run one last cycle.
async fn run_sync_watch(config: &AppConfig) -> Result<(), CliError> {
    let interval = config.sync_interval()?;
    let (orchestrator, client) = build_orchestrator(config)?;
    let orchestrator = Arc::new(orchestrator);
    let mut completed = orchestrator.subscribe();
    let scheduler = SyncScheduler::spawn(Arc::clone(&orchestrator), interval, client.subscribe());

    println!(
        "Syncing every {}s. Press Ctrl-C to stop.",
        interval.as_secs()
    );
    if !scheduler.sync_now().await {
        eprintln!("Initial sync did not complete; retrying on the next interval.");
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = completed.recv() => match event {
                Ok(SyncEvent::Completed) => {
                    println!("Synced at {}", format_timestamp(chrono::Utc::now()));
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!("Running a final sync before exit...");
    if scheduler.shutdown().await {
        println!("Final sync completed");
    } else {
        eprintln!("Final sync did not complete");
    }
    Ok(())
}

pub fn run_sync_conflicts(limit: usize, as_json: bool, store: &LocalStore) -> Result<(), CliError> {
    let conflicts = store.recent_conflicts(limit)?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

/// Text for a finished cycle, or the error a failed one maps to.
pub fn outcome_message(outcome: SyncOutcome) -> Result<String, CliError> {
    match outcome {
        SyncOutcome::Completed(summary) => Ok(format_sync_summary(&summary)),
        SyncOutcome::Skipped(SkipReason::InFlight) => {
            Ok("A sync is already running; nothing to do.".to_string())
        }
        SyncOutcome::Skipped(SkipReason::Unauthenticated) => Err(CliError::NotSignedIn),
        SyncOutcome::Failed { phase, message } => Err(CliError::SyncFailed {
            phase: phase.to_string(),
            message,
        }),
    }
}

pub fn format_sync_summary(summary: &SyncSummary) -> String {
    format!(
        "Sync completed: {} todos, {} plans, {} notes ({} pulled, {} pushed, {} conflicts resolved)",
        summary.todos,
        summary.plans,
        summary.notes,
        summary.pulled_new,
        summary.pushed_new,
        summary.conflicts.len()
    )
}
