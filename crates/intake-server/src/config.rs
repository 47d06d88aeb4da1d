//! Server configuration: JSON file, then environment overrides.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use intake_spec::{FileStore, FormError, FormStore, MemoryStore, RetryPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ENV_BIND: &str = "INTAKE_BIND";
pub const ENV_DATA_FILE: &str = "INTAKE_DATA_FILE";
pub const ENV_LOG: &str = "INTAKE_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("token grant for '{0}' has an empty token")]
    EmptyToken(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
    pub storage: StorageConfig,
    pub retry: RetrySettings,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_filter: "info".into(),
            storage: StorageConfig::Memory,
            retry: RetrySettings::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenGrant>,
    /// Accept submissions without a bearer token.
    pub public_submissions: bool,
}

/// Static bearer token and the principal it resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub principal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<Uuid>,
    #[serde(default)]
    pub admin: bool,
}

impl ServerConfig {
    /// Reads the JSON file if given (defaults otherwise) and applies
    /// process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.check()?;
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_BIND) {
            self.bind = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_BIND,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_DATA_FILE) {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidEnv {
                    key: ENV_DATA_FILE,
                    value,
                });
            }
            self.storage = StorageConfig::File {
                path: PathBuf::from(value),
            };
        }
        if let Some(value) = lookup(ENV_LOG)
            && !value.trim().is_empty()
        {
            self.log_filter = value;
        }
        Ok(())
    }

    fn check(&self) -> Result<(), ConfigError> {
        match self
            .auth
            .tokens
            .iter()
            .find(|grant| grant.token.trim().is_empty())
        {
            Some(grant) => Err(ConfigError::EmptyToken(grant.principal.clone())),
            None => Ok(()),
        }
    }

    pub fn open_store(&self) -> Result<Arc<dyn FormStore>, FormError> {
        Ok(match &self.storage {
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
            StorageConfig::File { path } => Arc::new(FileStore::open(path)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_spec::{FormType, InstitutionId, NewForm};
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "storage": { "kind": "file", "path": "data/forms.json" },
                 "auth": { "public_submissions": true } }"#,
        )
        .unwrap();
        assert_eq!(config.bind, ServerConfig::default().bind);
        assert_eq!(config.retry, RetrySettings::default());
        assert!(config.auth.public_submissions);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                path: PathBuf::from("data/forms.json")
            }
        );
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_DATA_FILE, "/var/lib/intake/forms.json"),
            (ENV_LOG, "intake_server=debug"),
        ]);
        let mut config = ServerConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.log_filter, "intake_server=debug");
        assert!(matches!(config.storage, StorageConfig::File { .. }));
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_BIND).then(|| "not-an-addr".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: ENV_BIND, .. }));
    }

    #[test]
    fn file_storage_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("intake.json");
        let data_path = dir.path().join("forms.json");
        fs::write(
            &config_path,
            serde_json::json!({ "storage": { "kind": "file", "path": data_path } }).to_string(),
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        let institution = InstitutionId(Uuid::from_u128(7));
        let created = config
            .open_store()
            .unwrap()
            .create_form(institution, NewForm::new("Open Day", FormType::Custom))
            .unwrap();
        assert!(data_path.exists());

        let reopened = config.open_store().unwrap();
        let forms = reopened.list_forms(institution, true).unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].id, created.id);
    }

    #[test]
    fn retry_settings_convert_to_policy() {
        let policy: RetryPolicy = RetrySettings {
            max_attempts: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
        }
        .into();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
    }
}
