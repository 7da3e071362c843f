//! Supabase session persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use dayplan_core::auth::{AuthResult, SessionPersistence, SupabaseAuthClient};
pub use dayplan_core::auth::{AuthError, AuthSession};
use dayplan_core::config::SupabaseConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "dayplan-cli";

/// One keychain entry per Supabase project.
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn for_project(project_url: &str) -> Self {
        Self {
            username: format!("supabase_session:{}", project_url.trim_end_matches('/')),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub type CliAuthClient = SupabaseAuthClient<SessionStore>;

pub fn auth_client(supabase: &SupabaseConfig) -> AuthResult<CliAuthClient> {
    SupabaseAuthClient::new(
        &supabase.url,
        supabase.anon_key.clone(),
        SessionStore::for_project(&supabase.url),
    )
}

pub fn load_stored_session(supabase: &SupabaseConfig) -> AuthResult<Option<AuthSession>> {
    SessionStore::for_project(&supabase.url).load_session()
}

pub fn clear_stored_session(supabase: &SupabaseConfig) -> AuthResult<()> {
    SessionStore::for_project(&supabase.url).clear_session()
}

#[cfg(test)]
mod tests {
    use dayplan_core::auth::AuthUser;

    use super::*;

    fn project(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
        }
    }

    fn session(user: &str) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: user.to_string(),
                email: Some(format!("{user}@example.com")),
            },
        }
    }

    #[test]
    fn sessions_are_stored_per_project() {
        let first = project("https://first.supabase.co");
        let second = project("https://second.supabase.co/");
        SessionStore::for_project(&first.url)
            .save_session(&session("alice"))
            .unwrap();

        assert_eq!(load_stored_session(&first).unwrap(), Some(session("alice")));
        assert_eq!(load_stored_session(&second).unwrap(), None);

        clear_stored_session(&first).unwrap();
        assert_eq!(load_stored_session(&first).unwrap(), None);
    }

    #[test]
    fn trailing_slash_does_not_change_the_entry() {
        let with_slash = project("https://slash.supabase.co/");
        let without = project("https://slash.supabase.co");
        SessionStore::for_project(&with_slash.url)
            .save_session(&session("bob"))
            .unwrap();
        assert_eq!(load_stored_session(&without).unwrap(), Some(session("bob")));
        clear_stored_session(&without).unwrap();
    }
}
