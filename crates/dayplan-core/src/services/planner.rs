//! Todo, plan and note operations over the local store.

use std::collections::BTreeMap;

use crate::models::{DayKey, Note, Plan, Priority, Subtask, Todo};
use crate::store::LocalStore;
use crate::util::{next_record_id, normalize_text_option};
use crate::{Error, Result};

/// Calendar marker for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub total: usize,
    pub completed: usize,
}

/// Owner of the local application state.
///
/// Every mutation stamps `updated_at` on the record it touches so the next
/// sync cycle can tell which side is newer.
#[derive(Clone)]
pub struct Planner {
    store: LocalStore,
}

impl Planner {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    // Todos

    pub fn add_todo(&self, day: DayKey, text: &str, priority: Option<Priority>) -> Result<Todo> {
        let text = required_text(text, "todo text")?;
        let existing = self.store.read_all_todos()?;
        let id = next_record_id(existing.iter().map(|todo| todo.id));
        let todo = Todo::new(id, day, text).with_priority(priority);

        let mut todos = self.store.read_todos_for_day(day)?;
        todos.push(todo.clone());
        self.store.write_todos_for_day(day, &todos)?;
        Ok(todo)
    }

    pub fn todos_for_day(&self, day: DayKey) -> Result<Vec<Todo>> {
        self.store.read_todos_for_day(day)
    }

    pub fn toggle_todo(&self, day: DayKey, id: i64) -> Result<Todo> {
        self.update_todo(day, id, Todo::toggle)
    }

    pub fn set_todo_priority(
        &self,
        day: DayKey,
        id: i64,
        priority: Option<Priority>,
    ) -> Result<Todo> {
        self.update_todo(day, id, |todo| {
            todo.priority = priority;
            todo.touch();
        })
    }

    pub fn delete_todo(&self, day: DayKey, id: i64) -> Result<()> {
        let mut todos = self.store.read_todos_for_day(day)?;
        let before = todos.len();
        todos.retain(|todo| todo.id != id);
        if todos.len() == before {
            return Err(todo_not_found(day, id));
        }
        self.store.write_todos_for_day(day, &todos)
    }

    pub fn days_with_todos(&self) -> Result<BTreeMap<DayKey, DayStats>> {
        let mut days: BTreeMap<DayKey, DayStats> = BTreeMap::new();
        for todo in self.store.read_all_todos()? {
            let stats = days.entry(todo.date_key).or_default();
            stats.total += 1;
            if todo.completed {
                stats.completed += 1;
            }
        }
        Ok(days)
    }

    fn update_todo(&self, day: DayKey, id: i64, update: impl FnOnce(&mut Todo)) -> Result<Todo> {
        let mut todos = self.store.read_todos_for_day(day)?;
        let todo = todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or_else(|| todo_not_found(day, id))?;
        update(todo);
        let updated = todo.clone();
        self.store.write_todos_for_day(day, &todos)?;
        Ok(updated)
    }

    // Plans

    pub fn plans(&self) -> Result<Vec<Plan>> {
        self.store.plans()
    }

    pub fn add_plan(&self, title: &str) -> Result<Plan> {
        let title = required_text(title, "plan title")?;
        let mut plans = self.store.plans()?;
        let plan = Plan::new(next_record_id(plans.iter().map(|plan| plan.id)), title);
        plans.push(plan.clone());
        self.store.write_plans(&plans)?;
        Ok(plan)
    }

    pub fn update_plan_title(&self, plan_id: i64, title: &str) -> Result<Plan> {
        let title = required_text(title, "plan title")?;
        self.update_plan(plan_id, |plan| {
            plan.title = title;
            plan.touch();
            Ok(())
        })
    }

    /// Blank descriptions clear the field.
    pub fn update_plan_description(&self, plan_id: i64, description: &str) -> Result<Plan> {
        let description = description.trim().to_string();
        self.update_plan(plan_id, |plan| {
            plan.description = description;
            plan.touch();
            Ok(())
        })
    }

    pub fn set_plan_priority(&self, plan_id: i64, priority: Option<Priority>) -> Result<Plan> {
        self.update_plan(plan_id, |plan| {
            plan.priority = priority;
            plan.touch();
            Ok(())
        })
    }

    /// Append a subtask. Adding an open subtask reopens a completed plan.
    pub fn add_subtask(&self, plan_id: i64, text: &str) -> Result<Plan> {
        let text = required_text(text, "subtask text")?;
        self.update_plan(plan_id, |plan| {
            let id = next_record_id(plan.subtasks.iter().map(|subtask| subtask.id));
            plan.subtasks.push(Subtask::new(id, text));
            plan.touch();
            Ok(())
        })
    }

    pub fn toggle_subtask(&self, plan_id: i64, subtask_id: i64) -> Result<Plan> {
        self.update_plan(plan_id, |plan| {
            let subtask = plan
                .subtask_mut(subtask_id)
                .ok_or_else(|| subtask_not_found(plan_id, subtask_id))?;
            subtask.completed = !subtask.completed;
            plan.touch_subtask(subtask_id);
            Ok(())
        })
    }

    pub fn delete_subtask(&self, plan_id: i64, subtask_id: i64) -> Result<Plan> {
        self.update_plan(plan_id, |plan| {
            let before = plan.subtasks.len();
            plan.subtasks.retain(|subtask| subtask.id != subtask_id);
            if plan.subtasks.len() == before {
                return Err(subtask_not_found(plan_id, subtask_id));
            }
            plan.touch();
            Ok(())
        })
    }

    /// Move a subtask to `index`; indexes past the end move it last.
    pub fn move_subtask(&self, plan_id: i64, subtask_id: i64, index: usize) -> Result<Plan> {
        self.update_plan(plan_id, |plan| {
            if plan.move_subtask(subtask_id, index) {
                Ok(())
            } else {
                Err(subtask_not_found(plan_id, subtask_id))
            }
        })
    }

    pub fn delete_plan(&self, plan_id: i64) -> Result<()> {
        let mut plans = self.store.plans()?;
        let before = plans.len();
        plans.retain(|plan| plan.id != plan_id);
        if plans.len() == before {
            return Err(Error::NotFound(format!("plan {plan_id}")));
        }
        self.store.write_plans(&plans)
    }

    fn update_plan(
        &self,
        plan_id: i64,
        update: impl FnOnce(&mut Plan) -> Result<()>,
    ) -> Result<Plan> {
        let mut plans = self.store.plans()?;
        let plan = plans
            .iter_mut()
            .find(|plan| plan.id == plan_id)
            .ok_or_else(|| Error::NotFound(format!("plan {plan_id}")))?;
        update(plan)?;
        let updated = plan.clone();
        self.store.write_plans(&plans)?;
        Ok(updated)
    }

    // Notes

    /// Notes newest-first.
    pub fn notes(&self) -> Result<Vec<Note>> {
        self.store.notes()
    }

    pub fn add_note(&self, content: &str) -> Result<Note> {
        let content = required_text(content, "note content")?;
        let mut notes = self.store.notes()?;
        let note = Note::new(next_record_id(notes.iter().map(|note| note.id)), content);
        notes.insert(0, note.clone());
        self.store.write_notes(&notes)?;
        Ok(note)
    }

    pub fn update_note(&self, note_id: i64, content: &str) -> Result<Note> {
        let content = required_text(content, "note content")?;
        let mut notes = self.store.notes()?;
        let note = notes
            .iter_mut()
            .find(|note| note.id == note_id)
            .ok_or_else(|| Error::NotFound(format!("note {note_id}")))?;
        note.set_content(content);
        let updated = note.clone();
        self.store.write_notes(&notes)?;
        Ok(updated)
    }

    pub fn delete_note(&self, note_id: i64) -> Result<()> {
        let mut notes = self.store.notes()?;
        let before = notes.len();
        notes.retain(|note| note.id != note_id);
        if notes.len() == before {
            return Err(Error::NotFound(format!("note {note_id}")));
        }
        self.store.write_notes(&notes)
    }
}

fn required_text(value: &str, field: &str) -> Result<String> {
    normalize_text_option(Some(value.to_string()))
        .ok_or_else(|| Error::InvalidInput(format!("{field} cannot be empty")))
}

fn todo_not_found(day: DayKey, id: i64) -> Error {
    Error::NotFound(format!("todo {id} on {day}"))
}

fn subtask_not_found(plan_id: i64, subtask_id: i64) -> Error {
    Error::NotFound(format!("subtask {subtask_id} in plan {plan_id}"))
}
