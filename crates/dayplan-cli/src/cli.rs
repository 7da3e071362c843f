use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dayplan_core::Priority;

#[derive(Parser)]
#[command(name = "dayplan")]
#[command(about = "Daily todos, long-term plans and notes, synced when you are signed in")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local data file
    #[arg(long, global = true, value_name = "PATH")]
    pub data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage todos for a day
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Manage long-term plans and their steps
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Manage freeform notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Reconcile local data with the cloud backend
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Sign in to the cloud backend
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    None,
    Low,
    Medium,
    High,
}

impl PriorityArg {
    pub const fn into_priority(self) -> Option<Priority> {
        match self {
            Self::None => None,
            Self::Low => Some(Priority::Low),
            Self::Medium => Some(Priority::Medium),
            Self::High => Some(Priority::High),
        }
    }
}

#[derive(Subcommand)]
pub enum TodoCommands {
    /// Add a todo
    #[command(alias = "new")]
    Add {
        /// Todo text (read from stdin when omitted)
        text: Vec<String>,
        /// Day as YYYY-MM-DD, `today` or `tomorrow`
        #[arg(short, long)]
        day: Option<String>,
        /// Priority
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,
    },
    /// List todos for a day
    List {
        /// Day as YYYY-MM-DD, `today` or `tomorrow`
        #[arg(short, long)]
        day: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle completion of a todo
    Toggle {
        id: i64,
        #[arg(short, long)]
        day: Option<String>,
    },
    /// Set or clear the priority of a todo
    Priority {
        id: i64,
        #[arg(value_enum)]
        priority: PriorityArg,
        #[arg(short, long)]
        day: Option<String>,
    },
    /// Delete a todo
    Delete {
        id: i64,
        #[arg(short, long)]
        day: Option<String>,
    },
    /// Show every day with todos and its completion count
    Days {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a plan
    #[command(alias = "new")]
    Add {
        /// Plan title
        title: Vec<String>,
    },
    /// List plans with progress
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan with its steps
    Show { id: i64 },
    /// Change a plan's title
    Rename { id: i64, title: Vec<String> },
    /// Change a plan's description (empty clears it)
    Describe { id: i64, description: Vec<String> },
    /// Set or clear a plan's priority
    Priority {
        id: i64,
        #[arg(value_enum)]
        priority: PriorityArg,
    },
    /// Delete a plan
    Delete { id: i64 },
    /// Manage a plan's steps
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
}

#[derive(Subcommand)]
pub enum StepCommands {
    /// Append a step to a plan
    Add { plan: i64, text: Vec<String> },
    /// Toggle completion of a step
    Toggle { plan: i64, step: i64 },
    /// Delete a step
    Delete { plan: i64, step: i64 },
    /// Move a step to a zero-based position
    Move { plan: i64, step: i64, index: usize },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Add a note
    #[command(alias = "new")]
    Add {
        /// Note content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// List notes, newest first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a note's content
    Edit { id: i64, content: Vec<String> },
    /// Delete a note
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Keep syncing on an interval and on sign-in until interrupted
    Watch,
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and store the session in the keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show whether a session is stored
    Status,
    /// Sign out and clear the stored session
    Logout,
}
