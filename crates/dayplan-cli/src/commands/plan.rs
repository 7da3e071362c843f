use dayplan_core::services::Planner;

use crate::cli::{PlanCommands, StepCommands};
use crate::commands::common::{format_plan_detail, format_plan_lines, resolve_text};
use crate::error::CliError;

pub fn run_plan(command: PlanCommands, planner: &Planner) -> Result<(), CliError> {
    match command {
        PlanCommands::Add { title } => {
            let plan = planner.add_plan(&resolve_text(&title)?)?;
            println!("Created plan {}", plan.id);
        }
        PlanCommands::List { json } => {
            let plans = planner.plans()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plans)?);
            } else if plans.is_empty() {
                println!("No plans yet.");
            } else {
                for line in format_plan_lines(&plans) {
                    println!("{line}");
                }
            }
        }
        PlanCommands::Show { id } => {
            let plan = planner
                .plans()?
                .into_iter()
                .find(|plan| plan.id == id)
                .ok_or_else(|| dayplan_core::Error::NotFound(format!("plan {id}")))?;
            for line in format_plan_detail(&plan) {
                println!("{line}");
            }
        }
        PlanCommands::Rename { id, title } => {
            let plan = planner.update_plan_title(id, &resolve_text(&title)?)?;
            println!("Renamed plan {} to {}", plan.id, plan.title);
        }
        PlanCommands::Describe { id, description } => {
            planner.update_plan_description(id, &description.join(" "))?;
            println!("Updated plan {id}");
        }
        PlanCommands::Priority { id, priority } => {
            planner.set_plan_priority(id, priority.into_priority())?;
            println!("Updated plan {id}");
        }
        PlanCommands::Delete { id } => {
            planner.delete_plan(id)?;
            println!("Deleted plan {id}");
        }
        PlanCommands::Step { command } => run_step(command, planner)?,
    }
    Ok(())
}

fn run_step(command: StepCommands, planner: &Planner) -> Result<(), CliError> {
    let plan = match command {
        StepCommands::Add { plan, text } => planner.add_subtask(plan, &resolve_text(&text)?)?,
        StepCommands::Toggle { plan, step } => planner.toggle_subtask(plan, step)?,
        StepCommands::Delete { plan, step } => planner.delete_subtask(plan, step)?,
        StepCommands::Move { plan, step, index } => planner.move_subtask(plan, step, index)?,
    };
    for line in format_plan_detail(&plan) {
        println!("{line}");
    }
    Ok(())
}
