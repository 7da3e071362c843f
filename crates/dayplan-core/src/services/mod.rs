//! Application services shared by every client.

mod planner;

pub use planner::{DayStats, Planner};
