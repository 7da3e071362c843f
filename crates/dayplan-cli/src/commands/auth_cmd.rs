use dayplan_core::auth::{AuthSession, SignUpOutcome};
use dayplan_core::config::AppConfig;

use crate::auth::{auth_client, clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::{build_orchestrator, require_supabase};
use crate::commands::sync::sync_after_login;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, config: &AppConfig) -> Result<(), CliError> {
    let supabase = require_supabase(config)?;
    let client = auth_client(&supabase)?;

    match command {
        AuthCommands::Login { email, password } => {
            let session = client.sign_in(&email, &password).await?;
            println!("Signed in as {}", email_label(&session));
            login_sync(config).await?;
        }
        AuthCommands::Signup { email, password } => match client.sign_up(&email, &password).await? {
            SignUpOutcome::SignedIn(session) => {
                println!("Account created, signed in as {}", email_label(&session));
                login_sync(config).await?;
            }
            SignUpOutcome::ConfirmationRequired => {
                println!("Account created. Confirm your email, then run `dayplan auth login`.");
            }
        },
        AuthCommands::Status => match client.restore_session().await? {
            Some(session) => println!(
                "Signed in as {} (expires_at={})",
                email_label(&session),
                session.expires_at
            ),
            None => println!("Not signed in."),
        },
        AuthCommands::Logout => {
            if let Some(session) = load_stored_session(&supabase)? {
                client.sign_out(&session.access_token).await?;
            } else {
                clear_stored_session(&supabase)?;
            }
            println!("Signed out");
        }
    }
    Ok(())
}

async fn login_sync(config: &AppConfig) -> Result<(), CliError> {
    let (orchestrator, _client) = build_orchestrator(config)?;
    println!("{}", sync_after_login(&orchestrator).await?);
    Ok(())
}

pub fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}
