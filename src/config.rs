//! Configuration loading for the receiver service.
//!
//! Loads settings from `./receiver.toml` (or `$RECEIVER_CONFIG_PATH`) and then
//! applies environment overrides (`MQ_*`, `DB_*`, `APP_*`, `LOG_*`).
//!
//! Precedence: env vars > config file > defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

// ── Top-level config ────────────────────────────────────────────

/// Top-level receiver configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// HTTP listener settings (`[app]`).
    pub app: AppConfig,
    /// Message store settings (`[database]`).
    pub database: DatabaseConfig,
    /// AMQP broker settings (`[broker]`).
    pub broker: BrokerConfig,
    /// Log output settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl ReceiverConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// A missing config file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config file path: `$RECEIVER_CONFIG_PATH` or `./receiver.toml`.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("RECEIVER_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("receiver.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // App.
        if let Some(v) = env("APP_HOST") {
            self.app.host = v;
        }
        override_parsed(&env, "APP_PORT", &mut self.app.port);

        // Database.
        if let Some(v) = env("DB_HOST") {
            self.database.host = v;
        }
        override_parsed(&env, "DB_PORT", &mut self.database.port);
        if let Some(v) = env("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = env("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = env("DB_DATABASE") {
            self.database.database = v;
        }
        if let Some(v) = env("DATABASE_URL") {
            self.database.url = non_empty(v);
        }
        override_parsed(&env, "DB_MAX_CONNECTIONS", &mut self.database.max_connections);
        override_parsed(&env, "DB_TIMEOUT_SECS", &mut self.database.timeout_seconds);

        // Broker.
        if let Some(v) = env("MQ_USER") {
            self.broker.user = v;
        }
        if let Some(v) = env("MQ_PASSWORD") {
            self.broker.password = Some(v);
        }
        if let Some(v) = env("MQ_HOST") {
            self.broker.host = v;
        }
        override_parsed(&env, "MQ_PORT", &mut self.broker.port);
        if let Some(v) = env("MQ_VHOST") {
            self.broker.vhost = v;
        }
        override_parsed(&env, "MQ_TIMEOUT_SECS", &mut self.broker.timeout_seconds);

        // Logging.
        if let Some(v) = env("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("LOG_DIR") {
            self.logging.dir = non_empty(v).map(PathBuf::from);
        }
    }

    /// Parse a TOML string into config (no env overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }
}

fn override_parsed<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) {
    if let Some(v) = env(key) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(var = key, value = %v, "ignoring invalid env override"),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// ── App config ──────────────────────────────────────────────────

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interface to bind.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
}

impl AppConfig {
    /// Resolve the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
        }
    }
}

// ── Database config ─────────────────────────────────────────────

/// Message store connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres host.
    pub host: String,
    /// Postgres port.
    pub port: u16,
    /// Postgres user.
    pub user: String,
    /// Postgres password (may be empty).
    pub password: String,
    /// Postgres database name.
    pub database: String,
    /// Full connection URL; overrides the individual fields when set.
    ///
    /// `sqlite:` URLs select the SQLite backend.
    pub url: Option<String>,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Timeout applied to every store call, in seconds.
    pub timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Timeout applied to every store call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"__REDACTED__")
            .field("database", &self.database)
            .field("url", &self.url.as_ref().map(|_| "__REDACTED__"))
            .field("max_connections", &self.max_connections)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "db".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: String::new(),
            database: "postgres".to_owned(),
            url: None,
            max_connections: 10,
            timeout_seconds: 5,
        }
    }
}

// ── Broker config ───────────────────────────────────────────────

/// AMQP broker connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker user name.
    pub user: String,
    /// Broker password; falls back to `user` when unset.
    pub password: Option<String>,
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Virtual host.
    pub vhost: String,
    /// Timeout applied to each broker round trip, in seconds.
    pub timeout_seconds: u64,
}

impl BrokerConfig {
    /// Timeout applied to each broker round trip.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Build the `amqp://` URI, percent-encoding credentials and vhost.
    ///
    /// # Errors
    ///
    /// Returns an error if the host or credentials cannot form a valid URI.
    pub fn amqp_uri(&self) -> Result<String> {
        let mut uri = Url::parse("amqp://localhost").context("invalid base AMQP URI")?;
        uri.set_host(Some(&self.host))
            .with_context(|| format!("invalid broker host {:?}", self.host))?;
        uri.set_port(Some(self.port))
            .map_err(|()| anyhow::anyhow!("broker URI cannot carry a port"))?;
        uri.set_username(&self.user)
            .map_err(|()| anyhow::anyhow!("broker URI cannot carry a user name"))?;
        let password = self.password.as_deref().unwrap_or(&self.user);
        uri.set_password(Some(password))
            .map_err(|()| anyhow::anyhow!("broker URI cannot carry a password"))?;
        let vhost: String = url::form_urlencoded::byte_serialize(self.vhost.as_bytes()).collect();
        uri.set_path(&format!("/{vhost}"));
        Ok(uri.to_string())
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "__REDACTED__"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            user: "guest".to_owned(),
            password: None,
            host: "mq".to_owned(),
            port: 5672,
            vhost: "/".to_owned(),
            timeout_seconds: 5,
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated JSON logs; console only when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
