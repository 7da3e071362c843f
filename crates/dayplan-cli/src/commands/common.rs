use std::io::{self, IsTerminal, Read};

use chrono::{DateTime, Utc};
use dayplan_core::auth::{SessionHandle, SessionOwnerProvider};
use dayplan_core::config::{AppConfig, SupabaseConfig};
use dayplan_core::models::{ConflictResolution, RecordKind};
use dayplan_core::services::{DayStats, Planner};
use dayplan_core::store::LocalStore;
use dayplan_core::sync::{PostgrestRemoteStore, SyncOrchestrator};
use dayplan_core::{DayKey, Note, Plan, SyncConflict, Todo};
use serde::Serialize;

use crate::auth::{auth_client, CliAuthClient, SessionStore};
use crate::error::CliError;

pub type CliOrchestrator = SyncOrchestrator<PostgrestRemoteStore, SessionOwnerProvider<SessionStore>>;

#[derive(Debug, Serialize)]
pub struct DayListItem {
    pub day: String,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub kind: String,
    pub record_id: i64,
    pub local_updated_at: Option<String>,
    pub remote_updated_at: Option<String>,
    pub resolution: String,
    pub resolved_at: String,
}

pub fn open_store(config: &AppConfig) -> Result<LocalStore, CliError> {
    let path = config.resolve_data_path()?;
    Ok(LocalStore::open_path(path)?)
}

pub fn open_planner(config: &AppConfig) -> Result<Planner, CliError> {
    Ok(Planner::new(open_store(config)?))
}

pub fn require_supabase(config: &AppConfig) -> Result<SupabaseConfig, CliError> {
    config.supabase()?.ok_or(CliError::SyncNotConfigured)
}

/// Wire the local store, the REST store and the keychain session together.
pub fn build_orchestrator(
    config: &AppConfig,
) -> Result<(CliOrchestrator, CliAuthClient), CliError> {
    let supabase = require_supabase(config)?;
    let store = open_store(config)?;
    let client = auth_client(&supabase)?;
    let session = SessionHandle::default();
    let remote = PostgrestRemoteStore::new(&supabase.url, supabase.anon_key.clone(), session.clone())?;
    let owners = SessionOwnerProvider::new(client.clone(), session);
    Ok((SyncOrchestrator::new(store, remote, owners), client))
}

/// Parse `YYYY-MM-DD`, `today` or `tomorrow`; no value means today.
pub fn resolve_day(raw: Option<&str>) -> Result<DayKey, CliError> {
    let today = DayKey::today();
    match raw.map(str::trim) {
        None | Some("" | "today") => Ok(today),
        Some("tomorrow") => today
            .date()
            .succ_opt()
            .map(DayKey::from_date)
            .ok_or_else(|| CliError::InvalidDay("tomorrow".to_string())),
        Some(raw) => raw
            .parse()
            .map_err(|_| CliError::InvalidDay(raw.to_string())),
    }
}

/// Join positional words, falling back to piped stdin.
pub fn resolve_text(parts: &[String]) -> Result<String, CliError> {
    if let Some(text) = normalize_content(&parts.join(" ")) {
        return Ok(text);
    }

    if let Some(text) = read_piped_stdin()? {
        return Ok(text);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn format_todo_lines(todos: &[Todo]) -> Vec<String> {
    todos
        .iter()
        .map(|todo| {
            let mark = if todo.completed { 'x' } else { ' ' };
            let priority = todo
                .priority
                .map(|priority| format!("  ({})", priority.as_str()))
                .unwrap_or_default();
            format!("[{mark}] {}  {}{priority}", todo.id, todo.text)
        })
        .collect()
}

pub fn format_plan_lines(plans: &[Plan]) -> Vec<String> {
    plans
        .iter()
        .map(|plan| {
            let (done, total) = plan.progress();
            let status = if plan.is_completed() { "done" } else { "open" };
            format!("{}  {:<4}  {}/{}  {}", plan.id, status, done, total, plan.title)
        })
        .collect()
}

pub fn format_plan_detail(plan: &Plan) -> Vec<String> {
    let mut lines = format_plan_lines(std::slice::from_ref(plan));
    if let Some(priority) = plan.priority {
        lines.push(format!("priority: {}", priority.as_str()));
    }
    if !plan.description.is_empty() {
        lines.push(plan.description.clone());
    }
    for (index, subtask) in plan.subtasks.iter().enumerate() {
        let mark = if subtask.completed { 'x' } else { ' ' };
        lines.push(format!("  {index}. [{mark}] {}  {}", subtask.id, subtask.text));
    }
    lines
}

pub fn format_note_lines(notes: &[Note], now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let age = note.timestamp.map_or_else(
                || "unknown".to_string(),
                |created| format_relative_time(created.timestamp_millis(), now_ms),
            );
            format!("{}  {:<8}  {}", note.id, age, note.title_preview(60))
        })
        .collect()
}

pub fn day_to_item(day: DayKey, stats: DayStats) -> DayListItem {
    DayListItem {
        day: day.to_string(),
        total: stats.total,
        completed: stats.completed,
    }
}

pub fn format_day_line(day: DayKey, stats: DayStats) -> String {
    format!("{day}  {}/{}", stats.completed, stats.total)
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        kind: kind_label(conflict.kind).to_string(),
        record_id: conflict.record_id,
        local_updated_at: conflict.local_updated_at.map(|at| at.to_rfc3339()),
        remote_updated_at: conflict.remote_updated_at.map(|at| at.to_rfc3339()),
        resolution: resolution_label(conflict).to_string(),
        resolved_at: conflict.resolved_at.to_rfc3339(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  {}={}  local={} remote={}",
                format_timestamp(conflict.resolved_at),
                resolution_label(conflict),
                kind_label(conflict.kind),
                conflict.record_id,
                format_optional_timestamp(conflict.local_updated_at),
                format_optional_timestamp(conflict.remote_updated_at)
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_optional_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(|| "none".to_string(), format_timestamp)
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

const fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Todo => "todo",
        RecordKind::Plan => "plan",
        RecordKind::Note => "note",
    }
}

const fn resolution_label(conflict: &SyncConflict) -> &'static str {
    match conflict.resolution {
        ConflictResolution::LocalWins => "local",
        ConflictResolution::RemoteWins => "remote",
    }
}
