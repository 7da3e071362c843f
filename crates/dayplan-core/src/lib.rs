//! dayplan-core - Core library for dayplan
//!
//! This crate contains the record models, the local key-value store, the
//! merge engine and the cloud sync orchestrator shared by every dayplan
//! interface.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{DayKey, Note, Plan, Priority, Subtask, SyncConflict, Todo};
pub use services::Planner;
