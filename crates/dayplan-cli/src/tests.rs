use chrono::{TimeZone, Utc};
use clap::Parser;
use dayplan_core::config::AppConfig;
use dayplan_core::models::{ConflictResolution, RecordKind};
use dayplan_core::services::{DayStats, Planner};
use dayplan_core::store::LocalStore;
use dayplan_core::auth::{OwnerId, StaticOwnerProvider};
use dayplan_core::sync::{
    InMemoryRemoteStore, SkipReason, SyncOrchestrator, SyncOutcome, SyncPhase, SyncSummary,
};
use dayplan_core::{DayKey, Note, Plan, Priority, Subtask, SyncConflict, Todo};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, PriorityArg, TodoCommands};
use crate::commands::common::{
    build_orchestrator, format_day_line, format_note_lines, format_plan_detail,
    format_plan_lines, format_relative_time, format_sync_conflict_lines, format_todo_lines,
    normalize_content, resolve_day, sync_conflict_to_item,
};
use crate::commands::completions::render_completions;
use crate::commands::sync::{
    format_sync_summary, outcome_message, run_sync_conflicts, sync_after_login,
};
use crate::error::CliError;

fn day(raw: &str) -> DayKey {
    raw.parse().unwrap()
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn resolve_day_accepts_keywords_and_dates() {
    let today = DayKey::today();
    assert_eq!(resolve_day(None).unwrap(), today);
    assert_eq!(resolve_day(Some("today")).unwrap(), today);
    assert_eq!(
        resolve_day(Some("tomorrow")).unwrap().date(),
        today.date().succ_opt().unwrap()
    );
    assert_eq!(resolve_day(Some("2024-5-1")).unwrap(), day("2024-05-01"));
    assert!(matches!(
        resolve_day(Some("next week")),
        Err(CliError::InvalidDay(_))
    ));
}

#[test]
fn priority_arg_maps_to_optional_priority() {
    assert_eq!(PriorityArg::None.into_priority(), None);
    assert_eq!(PriorityArg::High.into_priority(), Some(Priority::High));
}

#[test]
fn todo_add_parses_day_and_priority() {
    let cli = Cli::parse_from([
        "dayplan", "todo", "add", "buy", "milk", "--day", "2024-05-01", "--priority", "low",
    ]);
    let Commands::Todo {
        command: TodoCommands::Add {
            text,
            day,
            priority,
        },
    } = cli.command
    else {
        panic!("expected todo add");
    };
    assert_eq!(text, vec!["buy".to_string(), "milk".to_string()]);
    assert_eq!(day.as_deref(), Some("2024-05-01"));
    assert_eq!(priority, Some(PriorityArg::Low));
}

#[test]
fn todo_lines_show_completion_and_priority() {
    let mut done = Todo::new(1, day("2024-05-01"), "buy milk").with_priority(Some(Priority::High));
    done.completed = true;
    let open = Todo::new(2, day("2024-05-01"), "call mum");

    assert_eq!(
        format_todo_lines(&[done, open]),
        vec![
            "[x] 1  buy milk  (high)".to_string(),
            "[ ] 2  call mum".to_string()
        ]
    );
}

#[test]
fn plan_lines_show_progress() {
    let mut plan = Plan::new(7, "learn piano");
    plan.subtasks = vec![
        Subtask {
            completed: true,
            ..Subtask::new(1, "scales")
        },
        Subtask::new(2, "chords"),
    ];

    assert_eq!(format_plan_lines(&[plan.clone()]), vec!["7  open  1/2  learn piano"]);
    let detail = format_plan_detail(&plan);
    assert_eq!(detail[1], "  0. [x] 1  scales");
    assert_eq!(detail[2], "  1. [ ] 2  chords");
}

#[test]
fn note_lines_use_relative_age() {
    let mut note = Note::new(3, "groceries\nmilk, eggs");
    let created = Utc.timestamp_millis_opt(10_000_000).unwrap();
    note.timestamp = Some(created);

    assert_eq!(
        format_note_lines(&[note], 10_000_000 + 120_000),
        vec!["3  2m ago    groceries"]
    );
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn day_lines_show_completion_counts() {
    let stats = DayStats {
        total: 3,
        completed: 1,
    };
    assert_eq!(format_day_line(day("2024-05-01"), stats), "2024-05-01  1/3");
}

fn conflict() -> SyncConflict {
    let at = |seconds: i64| Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap();
    SyncConflict {
        kind: RecordKind::Todo,
        record_id: 42,
        local_updated_at: Some(at(1)),
        remote_updated_at: Some(at(2)),
        resolution: ConflictResolution::RemoteWins,
        resolved_at: at(3),
    }
}

#[test]
fn sync_conflict_lines_and_items() {
    assert_eq!(
        format_sync_conflict_lines(&[conflict()]),
        vec![
            "2023-11-14 22:13:23 UTC  remote  todo=42  local=2023-11-14 22:13:21 UTC remote=2023-11-14 22:13:22 UTC"
        ]
    );

    let item = sync_conflict_to_item(&conflict());
    assert_eq!(item.kind, "todo");
    assert_eq!(item.resolution, "remote");
    assert_eq!(item.resolved_at, "2023-11-14T22:13:23+00:00");
}

#[test]
fn sync_conflicts_command_reads_recorded_conflicts() {
    let store = LocalStore::in_memory();
    store.record_conflicts(&[conflict()]).unwrap();
    run_sync_conflicts(10, true, &store).unwrap();
    run_sync_conflicts(10, false, &LocalStore::in_memory()).unwrap();
}

#[test]
fn sync_outcomes_map_to_messages_and_errors() {
    let summary = SyncSummary {
        todos: 2,
        plans: 1,
        notes: 0,
        pulled_new: 1,
        pushed_new: 1,
        conflicts: vec![conflict()],
    };
    assert_eq!(
        format_sync_summary(&summary),
        "Sync completed: 2 todos, 1 plans, 0 notes (1 pulled, 1 pushed, 1 conflicts resolved)"
    );
    assert!(outcome_message(SyncOutcome::Completed(summary)).is_ok());
    assert!(outcome_message(SyncOutcome::Skipped(SkipReason::InFlight)).is_ok());
    assert!(matches!(
        outcome_message(SyncOutcome::Skipped(SkipReason::Unauthenticated)),
        Err(CliError::NotSignedIn)
    ));
    assert!(matches!(
        outcome_message(SyncOutcome::Failed {
            phase: SyncPhase::Pushing,
            message: "offline".to_string()
        }),
        Err(CliError::SyncFailed { .. })
    ));
}

#[tokio::test]
async fn login_runs_a_sync_cycle_for_the_new_owner() {
    let store = LocalStore::in_memory();
    store.write_notes(&[Note::new(1, "written offline")]).unwrap();
    let orchestrator = SyncOrchestrator::new(
        store,
        InMemoryRemoteStore::new(),
        StaticOwnerProvider::new(Some(OwnerId::new("owner-1"))),
    );

    let message = sync_after_login(&orchestrator).await.unwrap();
    assert!(message.starts_with("Sync completed"));
    assert_eq!(orchestrator.remote().store().rows(RecordKind::Note).len(), 1);
}

#[tokio::test]
async fn login_sync_without_a_session_reports_not_signed_in() {
    let orchestrator = SyncOrchestrator::new(
        LocalStore::in_memory(),
        InMemoryRemoteStore::new(),
        StaticOwnerProvider::new(None),
    );
    assert!(matches!(
        sync_after_login(&orchestrator).await,
        Err(CliError::NotSignedIn)
    ));
}

#[test]
fn sync_requires_supabase_configuration() {
    let config = AppConfig {
        data_path: Some(std::env::temp_dir().join("dayplan-cli-unused.db")),
        ..AppConfig::default()
    };
    assert!(matches!(
        build_orchestrator(&config),
        Err(CliError::SyncNotConfigured)
    ));
}

#[test]
fn planner_persists_to_the_configured_data_path() {
    let dir = tempfile_dir();
    let path = dir.join("dayplan.db");
    {
        let planner = Planner::new(LocalStore::open_path(&path).unwrap());
        planner.add_note("remember me").unwrap();
    }
    let planner = Planner::new(LocalStore::open_path(&path).unwrap());
    assert_eq!(planner.notes().unwrap()[0].content, "remember me");
    std::fs::remove_dir_all(dir).ok();
}

fn tempfile_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "dayplan-cli-test-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn completions_mention_the_binary_name() {
    for shell in [CompletionShell::Bash, CompletionShell::Zsh, CompletionShell::Fish] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("dayplan"));
    }
}
