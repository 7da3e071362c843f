pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod note;
pub mod plan;
pub mod sync;
pub mod todo;
