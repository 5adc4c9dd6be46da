//! Service configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file
//! (`renfound.toml`, or the path in `RENFOUND_CONFIG`), then environment
//! variables such as `APP__JWT__ACCESS_SECRET`.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use renfound_infrastructure::auth::MAX_TOKEN_TTL;
use renfound_infrastructure::{DatabaseSettings, TokenSettings, WorkerPoolSettings};
use serde::Deserialize;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "RENFOUND_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "renfound";

/// Configuration could not be loaded or is unusable.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source failed to load or deserialize.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values loaded but break a rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Grace period for draining background work on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Token secrets and lifetimes. Zero or missing lifetimes use the defaults.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// Access token signing secret.
    pub access_secret: String,
    /// Refresh token signing secret. Must differ from the access secret.
    pub refresh_secret: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: Option<u64>,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: Option<u64>,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Bot whose init data is accepted.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Token of the bot the Mini App belongs to.
    pub bot_token: String,
    /// Oldest acceptable `auth_date`; zero turns the check off.
    pub init_data_max_age_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            init_data_max_age_secs: 86_400,
        }
    }
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("init_data_max_age_secs", &self.init_data_max_age_secs)
            .finish_non_exhaustive()
    }
}

/// PostgreSQL pool. Without a URL the in-memory store is used.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `postgres://` connection string.
    pub url: Option<String>,
    /// Pool ceiling.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Connection lifetime in seconds.
    pub max_lifetime_secs: u64,
    /// Idle timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Acquire timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 0,
            max_lifetime_secs: 3600,
            idle_timeout_secs: 1800,
            connect_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field(
                "url",
                &self.url.as_deref().map(renfound_infrastructure::persistence::redacted_url),
            )
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish_non_exhaustive()
    }
}

/// Background persistence pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Worker task count.
    pub workers: usize,
    /// Queue capacity; submissions beyond it are dropped.
    pub queue_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let defaults = WorkerPoolSettings::default();
        Self {
            workers: defaults.workers,
            queue_size: defaults.queue_size,
        }
    }
}

/// Expired-session cleanup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds between sweeps; zero disables the reaper.
    pub reap_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reap_interval_secs: 3600,
        }
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// Log filter and format. `RUST_LOG` overrides `level`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// `EnvFilter` directive, e.g. `info` or `renfound=debug`.
    pub level: String,
    /// Output encoding.
    pub format: LogFormat,
    /// `stdout`, `stderr` or a file to append to. Empty means `stdout`.
    pub output_path: String,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            output_path: "stdout".to_string(),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[server]`
    pub server: ServerSettings,
    /// `[jwt]`
    pub jwt: JwtSettings,
    /// `[telegram]`
    pub telegram: TelegramSettings,
    /// `[database]`
    pub database: DatabaseConfig,
    /// `[worker_pool]`
    pub worker_pool: WorkerPoolConfig,
    /// `[sessions]`
    pub sessions: SessionSettings,
    /// `[logger]`
    pub logger: LoggerSettings,
}

impl Settings {
    /// Loads from the default file locations and the process environment.
    ///
    /// # Errors
    /// Fails if a source is unreadable or the result is invalid.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var(CONFIG_PATH_VAR).ok();
        Self::load_from(path.as_deref().map(Path::new), app_environment())
    }

    /// Loads from an explicit file (required if given) and environment source.
    ///
    /// # Errors
    /// Fails if a source is unreadable or the result is invalid.
    pub fn load_from(file: Option<&Path>, environment: Environment) -> Result<Self, SettingsError> {
        let builder = match file {
            Some(path) => Config::builder().add_source(File::from(path).required(true)),
            None => Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        let settings: Self = builder.add_source(environment).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        self.token_settings()?;
        if seconds(self.telegram.init_data_max_age_secs).is_none() {
            return Err(SettingsError::Invalid(
                "telegram.init_data_max_age_secs is out of range".to_string(),
            ));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(SettingsError::Invalid("telegram.bot_token must be set".to_string()));
        }
        if self.database.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(SettingsError::Invalid("database.url must not be blank".to_string()));
        }
        Ok(())
    }

    /// Listener address.
    ///
    /// # Errors
    /// Fails if `server.host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| SettingsError::Invalid(format!("server address: {e}")))
    }

    /// Secrets and lifetimes for the token authority.
    ///
    /// # Errors
    /// Fails on empty or shared secrets.
    pub fn token_settings(&self) -> Result<TokenSettings, SettingsError> {
        let access_ttl = token_ttl("jwt.access_ttl_secs", self.jwt.access_ttl_secs)?;
        let refresh_ttl = token_ttl("jwt.refresh_ttl_secs", self.jwt.refresh_ttl_secs)?;
        TokenSettings::new(&self.jwt.access_secret, &self.jwt.refresh_secret)
            .map(|t| t.with_ttls(access_ttl, refresh_ttl))
            .map_err(|e| SettingsError::Invalid(format!("jwt: {e}")))
    }

    /// Maximum init-data age; zero means unchecked. Values too large for a
    /// duration are rejected at load time.
    #[must_use]
    pub fn credential_max_age(&self) -> chrono::Duration {
        seconds(self.telegram.init_data_max_age_secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Pool settings, or `None` to run on the in-memory store.
    #[must_use]
    pub fn database_settings(&self) -> Option<DatabaseSettings> {
        let db = &self.database;
        db.url.clone().map(|url| DatabaseSettings {
            url,
            max_connections: db.max_connections,
            min_connections: db.min_connections,
            max_lifetime: Duration::from_secs(db.max_lifetime_secs),
            idle_timeout: Duration::from_secs(db.idle_timeout_secs),
            connect_timeout: Duration::from_secs(db.connect_timeout_secs),
        })
    }

    /// Worker pool dimensions.
    #[must_use]
    pub const fn worker_pool_settings(&self) -> WorkerPoolSettings {
        WorkerPoolSettings {
            workers: self.worker_pool.workers,
            queue_size: self.worker_pool.queue_size,
        }
    }

    /// Reaper period, or `None` when disabled.
    #[must_use]
    pub const fn reap_interval(&self) -> Option<Duration> {
        match self.sessions.reap_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Time allowed for draining background work on shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

fn seconds(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

/// Token lifetime from config; `None` keeps the default.
fn token_ttl(key: &str, secs: Option<u64>) -> Result<Option<chrono::Duration>, SettingsError> {
    let Some(secs) = secs else {
        return Ok(None);
    };
    match seconds(secs) {
        Some(ttl) if ttl <= MAX_TOKEN_TTL => Ok(Some(ttl)),
        _ => Err(SettingsError::Invalid(format!(
            "{key} must not exceed {} seconds",
            MAX_TOKEN_TTL.num_seconds()
        ))),
    }
}

/// `APP__SECTION__KEY` environment source.
#[must_use]
pub fn app_environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
