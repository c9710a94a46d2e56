use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "BOOKS_ETL";
pub const DEFAULT_CATALOGUE_BASE_URL: &str = "https://books.toscrape.com/catalogue/";
pub const DEFAULT_PAGE_COUNT: u32 = 5;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;
pub const DEFAULT_DAILY_AT: &str = "00:00";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("read configuration from environment")]
    Source(#[from] config::ConfigError),

    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid configuration {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Environment variable name for a nested settings key, e.g.
/// `env_var("connection", "user")` is `BOOKS_ETL_CONNECTION__USER`.
pub fn env_var(section: &str, key: &str) -> String {
    format!(
        "{ENV_PREFIX}_{}__{}",
        section.to_ascii_uppercase(),
        key.to_ascii_uppercase()
    )
}

/// Everything one invocation needs, resolved once and passed into each stage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalogue: CatalogueSettings,
    pub artifacts: ArtifactSettings,
    pub connection: ConnectionSettings,
    pub orchestrator: OrchestratorSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(None)
    }

    /// Same as [`Settings::from_env`] but reads from `vars` instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(Some(source))
    }

    fn load(source: Option<config::Map<String, String>>) -> Result<Self, SettingsError> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(source);

        let settings = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }

    /// Checks every setting a full run needs so a misconfigured run fails before extract starts.
    pub fn ensure_pipeline_ready(&self) -> Result<(), SettingsError> {
        let mut missing = Vec::new();
        if self.artifacts.raw_path.is_none() {
            missing.push(env_var("artifacts", "raw_path"));
        }
        if self.artifacts.processed_path.is_none() {
            missing.push(env_var("artifacts", "processed_path"));
        }
        missing.extend(self.connection.missing_keys());

        if !missing.is_empty() {
            return Err(SettingsError::Missing(missing));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogueSettings {
    pub base_url: String,
    pub page_count: u32,
}

impl Default for CatalogueSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOGUE_BASE_URL.to_owned(),
            page_count: DEFAULT_PAGE_COUNT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub raw_path: Option<PathBuf>,
    pub processed_path: Option<PathBuf>,
}

impl ArtifactSettings {
    pub fn raw_path(&self) -> Result<&Path, SettingsError> {
        self.raw_path
            .as_deref()
            .ok_or_else(|| SettingsError::Missing(vec![env_var("artifacts", "raw_path")]))
    }

    pub fn processed_path(&self) -> Result<&Path, SettingsError> {
        self.processed_path
            .as_deref()
            .ok_or_else(|| SettingsError::Missing(vec![env_var("artifacts", "processed_path")]))
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub account: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl ConnectionSettings {
    fn fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("user", self.user.as_deref()),
            ("password", self.password.as_deref()),
            ("account", self.account.as_deref()),
            ("warehouse", self.warehouse.as_deref()),
            ("database", self.database.as_deref()),
            ("schema", self.schema.as_deref()),
        ]
    }

    fn missing_keys(&self) -> Vec<String> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
            .map(|(key, _)| env_var("connection", key))
            .collect()
    }

    pub fn resolve(&self) -> Result<ConnectionConfig, SettingsError> {
        let missing = self.missing_keys();
        if !missing.is_empty() {
            return Err(SettingsError::Missing(missing));
        }

        let value = |field: &Option<String>| field.clone().unwrap_or_default();
        Ok(ConnectionConfig {
            user: value(&self.user),
            password: value(&self.password),
            account: value(&self.account),
            warehouse: value(&self.warehouse),
            database: value(&self.database),
            schema: value(&self.schema),
        })
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Fully resolved warehouse connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub user: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

impl ConnectionConfig {
    /// Human-readable connection target, safe to log.
    pub fn describe(&self) -> String {
        format!(
            "{}@{}/{}.{} (warehouse {})",
            self.user, self.account, self.database, self.schema, self.warehouse
        )
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub runs_dir: PathBuf,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub daily_at: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("data").join("runs"),
            retries: DEFAULT_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            daily_at: DEFAULT_DAILY_AT.to_owned(),
        }
    }
}

impl OrchestratorSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Daily trigger time (UTC), written as `HH:MM`.
    pub fn daily_at(&self) -> Result<NaiveTime, SettingsError> {
        parse_daily_at(&self.daily_at)
    }
}

pub fn parse_daily_at(value: &str) -> Result<NaiveTime, SettingsError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|err| SettingsError::Invalid {
        key: env_var("orchestrator", "daily_at"),
        message: format!("expected HH:MM, got {value:?} ({err})"),
    })
}
