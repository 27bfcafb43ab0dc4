//! Application configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub backend: BackendConfig,
    pub livechat: LivechatConfig,
    pub log: LogConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Chat backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Host (and optional port) of the backend, with or without a scheme
    #[serde(default = "default_backend_host")]
    pub host: String,
    #[serde(default)]
    pub use_ssl: bool,
    pub username: String,
    pub password: String,
}

impl BackendConfig {
    /// WebSocket endpoint for the realtime API
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let host = self
            .host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("wss://")
            .trim_start_matches("ws://")
            .trim_end_matches('/');
        let scheme = if self.use_ssl || self.host.starts_with("https://") || self.host.starts_with("wss://") {
            "wss"
        } else {
            "ws"
        };
        format!("{scheme}://{host}/websocket")
    }
}

/// Livechat routing settings
#[derive(Debug, Clone, Deserialize)]
pub struct LivechatConfig {
    /// Department name new guests are routed to; `None` disables routing
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Idle time after which a guest session is dropped; `None` keeps sessions forever
    #[serde(default)]
    pub session_idle_secs: Option<u64>,
    #[serde(default = "default_resubscribe_attempts")]
    pub resubscribe_attempts: u32,
    #[serde(default = "default_resubscribe_delay_ms")]
    pub resubscribe_delay_ms: u64,
}

impl LivechatConfig {
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    #[must_use]
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        self.session_idle_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }
}

impl Default for LivechatConfig {
    fn default() -> Self {
        Self {
            department: None,
            call_timeout_ms: default_call_timeout_ms(),
            session_idle_secs: None,
            resubscribe_attempts: default_resubscribe_attempts(),
            resubscribe_delay_ms: default_resubscribe_delay_ms(),
        }
    }
}

/// Logging settings, handed to the tracing setup
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_app_name() -> String {
    "livechat-gateway".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_backend_host() -> String {
    "localhost:3000".to_string()
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_resubscribe_attempts() -> u32 {
    5
}

fn default_resubscribe_delay_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let non_empty = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let number = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            non_empty(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidValue(key, v.clone()))
                })
                .transpose()
        };

        let flag = |key: &'static str| -> Result<bool, ConfigError> {
            match lookup(key) {
                Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue(key, v)),
                None => Ok(false),
            }
        };

        let resubscribe_attempts = match number("LIVECHAT_RESUBSCRIBE_ATTEMPTS")? {
            Some(n) => u32::try_from(n)
                .map_err(|_| ConfigError::InvalidValue("LIVECHAT_RESUBSCRIBE_ATTEMPTS", n.to_string()))?,
            None => default_resubscribe_attempts(),
        };

        Ok(Self {
            app: AppSettings {
                name: non_empty("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            backend: BackendConfig {
                host: non_empty("ROCKETCHAT_URL").unwrap_or_else(default_backend_host),
                use_ssl: flag("ROCKETCHAT_USE_SSL")?,
                username: non_empty("ROCKETCHAT_USER")
                    .ok_or(ConfigError::MissingVar("ROCKETCHAT_USER"))?,
                password: non_empty("ROCKETCHAT_PASSWORD")
                    .ok_or(ConfigError::MissingVar("ROCKETCHAT_PASSWORD"))?,
            },
            livechat: LivechatConfig {
                department: non_empty("LIVECHAT_DEPARTMENT"),
                call_timeout_ms: number("LIVECHAT_CALL_TIMEOUT_MS")?
                    .unwrap_or_else(default_call_timeout_ms),
                session_idle_secs: number("LIVECHAT_SESSION_IDLE_SECS")?,
                resubscribe_attempts,
                resubscribe_delay_ms: number("LIVECHAT_RESUBSCRIBE_DELAY_MS")?
                    .unwrap_or_else(default_resubscribe_delay_ms),
            },
            log: LogConfig {
                level: non_empty("LOG_LEVEL").unwrap_or_else(default_log_level),
                json: flag("LOG_JSON")?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
