use dayplan_core::services::Planner;

use crate::cli::NoteCommands;
use crate::commands::common::{format_note_lines, resolve_text};
use crate::error::CliError;

pub fn run_note(command: NoteCommands, planner: &Planner) -> Result<(), CliError> {
    match command {
        NoteCommands::Add { content } => {
            let note = planner.add_note(&resolve_text(&content)?)?;
            println!("Added note {}", note.id);
        }
        NoteCommands::List { limit, json } => {
            let mut notes = planner.notes()?;
            notes.truncate(limit);
            if json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else if notes.is_empty() {
                println!("No notes yet.");
            } else {
                let now_ms = chrono::Utc::now().timestamp_millis();
                for line in format_note_lines(&notes, now_ms) {
                    println!("{line}");
                }
            }
        }
        NoteCommands::Edit { id, content } => {
            let note = planner.update_note(id, &resolve_text(&content)?)?;
            println!("Updated note {}", note.id);
        }
        NoteCommands::Delete { id } => {
            planner.delete_note(id)?;
            println!("Deleted note {id}");
        }
    }
    Ok(())
}
