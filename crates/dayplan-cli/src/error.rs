use std::io;

use dayplan_core::auth::AuthError;
use dayplan_core::config::ConfigError;
use dayplan_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] dayplan_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No content provided")]
    EmptyContent,
    #[error("Invalid day '{0}': expected YYYY-MM-DD, today or tomorrow")]
    InvalidDay(String),
    #[error(
        "Sync is not configured. Set supabase_url and supabase_anon_key in the config file or DAYPLAN_SUPABASE_URL and DAYPLAN_SUPABASE_ANON_KEY."
    )]
    SyncNotConfigured,
    #[error("Not signed in. Run `dayplan auth login` first.")]
    NotSignedIn,
    #[error("Sync failed while {phase}: {message}")]
    SyncFailed { phase: String, message: String },
}
