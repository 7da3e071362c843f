use dayplan_core::services::Planner;

use crate::cli::{PriorityArg, TodoCommands};
use crate::commands::common::{
    day_to_item, format_day_line, format_todo_lines, resolve_day, resolve_text, DayListItem,
};
use crate::error::CliError;

pub fn run_todo(command: TodoCommands, planner: &Planner) -> Result<(), CliError> {
    match command {
        TodoCommands::Add {
            text,
            day,
            priority,
        } => {
            let day = resolve_day(day.as_deref())?;
            let text = resolve_text(&text)?;
            let priority = priority.and_then(PriorityArg::into_priority);
            let todo = planner.add_todo(day, &text, priority)?;
            println!("Added todo {} for {}", todo.id, todo.date_key);
        }
        TodoCommands::List { day, json } => {
            let day = resolve_day(day.as_deref())?;
            let todos = planner.todos_for_day(day)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&todos)?);
            } else if todos.is_empty() {
                println!("No todos for {day}.");
            } else {
                for line in format_todo_lines(&todos) {
                    println!("{line}");
                }
            }
        }
        TodoCommands::Toggle { id, day } => {
            let todo = planner.toggle_todo(resolve_day(day.as_deref())?, id)?;
            let state = if todo.completed { "done" } else { "open" };
            println!("Todo {} is {state}", todo.id);
        }
        TodoCommands::Priority { id, priority, day } => {
            let todo = planner.set_todo_priority(
                resolve_day(day.as_deref())?,
                id,
                priority.into_priority(),
            )?;
            let label = todo.priority.map_or("none", |priority| priority.as_str());
            println!("Todo {} priority set to {label}", todo.id);
        }
        TodoCommands::Delete { id, day } => {
            planner.delete_todo(resolve_day(day.as_deref())?, id)?;
            println!("Deleted todo {id}");
        }
        TodoCommands::Days { json } => {
            let days = planner.days_with_todos()?;
            if json {
                let items = days
                    .into_iter()
                    .map(|(day, stats)| day_to_item(day, stats))
                    .collect::<Vec<DayListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for (day, stats) in days {
                    println!("{}", format_day_line(day, stats));
                }
            }
        }
    }
    Ok(())
}
