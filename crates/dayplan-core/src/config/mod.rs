//! Application configuration.
//!
//! `AppConfig` is read from `config.json` under the platform config
//! directory and then overridden by `DAYPLAN_*` environment variables. A
//! missing file yields the defaults: local-only mode, data under the
//! platform data directory and a five minute sync interval.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::resolve_optional_supabase_config;
use crate::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "config.json";
const DATA_FILE_NAME: &str = "dayplan.db";
const APP_DIR_NAME: &str = "dayplan";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

pub const ENV_SUPABASE_URL: &str = "DAYPLAN_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "DAYPLAN_SUPABASE_ANON_KEY";
pub const ENV_DATA_PATH: &str = "DAYPLAN_DATA_PATH";
pub const ENV_SYNC_INTERVAL_SECS: &str = "DAYPLAN_SYNC_INTERVAL_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Could not resolve the platform {0} directory")]
    NoPlatformDir(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Supabase project coordinates. Both halves are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
}

pub fn default_config_path() -> ConfigResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformDir("config"))
}

pub fn default_data_path() -> ConfigResult<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(DATA_FILE_NAME))
        .ok_or(ConfigError::NoPlatformDir("data"))
}

impl AppConfig {
    /// Load the default config file with environment overrides applied.
    pub fn load() -> ConfigResult<Self> {
        let mut config = Self::load_from_path(&default_config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> ConfigResult<()> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let mut normalized = self.clone();
        normalized.normalize();
        let raw = serde_json::to_string_pretty(&normalized).map_err(|error| {
            ConfigError::Invalid(format!("could not serialize config: {error}"))
        })?;
        std::fs::write(path, raw).map_err(write_error)
    }

    /// Apply `DAYPLAN_*` overrides. `lookup` resolves a variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(url) = normalize_text_option(lookup(ENV_SUPABASE_URL)) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DATA_PATH)) {
            self.data_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)) {
            let secs = raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_SYNC_INTERVAL_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            self.sync_interval_secs = Some(secs);
        }
        self.normalize();
        Ok(())
    }

    pub fn resolve_data_path(&self) -> ConfigResult<PathBuf> {
        match &self.data_path {
            Some(path) => Ok(path.clone()),
            None => default_data_path(),
        }
    }

    pub fn sync_interval(&self) -> ConfigResult<Duration> {
        let secs = self.sync_interval_secs.unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        if secs == 0 {
            return Err(ConfigError::Invalid(
                "sync interval must be at least one second".to_string(),
            ));
        }
        Ok(Duration::from_secs(secs))
    }

    /// Supabase settings, or `None` for local-only mode.
    ///
    /// Setting only one of the URL and anon key is an error.
    pub fn supabase(&self) -> ConfigResult<Option<SupabaseConfig>> {
        let resolved = resolve_optional_supabase_config(
            self.supabase_url.clone(),
            self.supabase_anon_key.clone(),
        )
        .map_err(|_| {
            ConfigError::Invalid(
                "supabase_url and supabase_anon_key must be set together".to_string(),
            )
        })?;
        let Some((url, anon_key)) = resolved else {
            return Ok(None);
        };
        if !is_http_url(&url) {
            return Err(ConfigError::Invalid(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
        Ok(Some(SupabaseConfig {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
        }))
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.data_path = self
            .data_path
            .take()
            .filter(|path| !path.as_os_str().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync_interval().unwrap(), Duration::from_secs(300));
        assert_eq!(config.supabase().unwrap(), None);
    }

    #[test]
    fn save_and_load_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            supabase_url: Some(" https://example.supabase.co/ ".to_string()),
            supabase_anon_key: Some("anon".to_string()),
            data_path: None,
            sync_interval_secs: Some(60),
        };

        config.save_to_path(&path).unwrap();
        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.supabase_url.as_deref(),
            Some("https://example.supabase.co/")
        );
        assert_eq!(
            loaded.supabase().unwrap(),
            Some(SupabaseConfig {
                url: "https://example.supabase.co".to_string(),
                anon_key: "anon".to_string(),
            })
        );
        assert_eq!(loaded.sync_interval().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"supabase_url": null, "colour": "blue"}"#).unwrap();
        assert!(matches!(
            AppConfig::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig {
            supabase_url: Some("https://file.example".to_string()),
            supabase_anon_key: Some("file-key".to_string()),
            data_path: Some(PathBuf::from("/tmp/file.db")),
            sync_interval_secs: Some(30),
        };
        config
            .apply_overrides(env(&[
                (ENV_SUPABASE_URL, "https://env.example"),
                (ENV_DATA_PATH, "/tmp/env.db"),
                (ENV_SYNC_INTERVAL_SECS, "90"),
                (ENV_SUPABASE_ANON_KEY, "   "),
            ]))
            .unwrap();

        assert_eq!(config.supabase_url.as_deref(), Some("https://env.example"));
        assert_eq!(config.supabase_anon_key.as_deref(), Some("file-key"));
        assert_eq!(config.resolve_data_path().unwrap(), PathBuf::from("/tmp/env.db"));
        assert_eq!(config.sync_interval().unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn invalid_interval_override_is_an_error() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(env(&[(ENV_SYNC_INTERVAL_SECS, "soon")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        config.sync_interval_secs = Some(0);
        assert!(config.sync_interval().is_err());
    }

    #[test]
    fn supabase_requires_both_url_and_key() {
        let config = AppConfig {
            supabase_url: Some("https://example.supabase.co".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(config.supabase(), Err(ConfigError::Invalid(_))));

        let config = AppConfig {
            supabase_url: Some("example.supabase.co".to_string()),
            supabase_anon_key: Some("anon".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(config.supabase(), Err(ConfigError::Invalid(_))));
    }
}
