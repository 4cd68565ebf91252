//! INI configuration file.
//!
//! The file lives at `<config dir>/incidents/config.ini`:
//!
//! ```ini
//! [server]
//! host = ims.example.com
//! port = 8443
//! tls = true
//! path = /ims/api/
//! username = Tool
//! user_agent = incidents-desk
//!
//! [sync]
//! reload_interval = 10
//! reload_timer = true
//! idle_timeout = 30
//! timeout = 3600
//!
//! [logging]
//! level = info
//! directory = /var/log/incidents
//! ```
//!
//! Missing keys take their defaults. Durations are whole seconds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::http::{SessionConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_TIMEOUT};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {reason}", .path.display())]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid value {value:?} for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default seconds between automatic reloads.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(10);

/// Default log level filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("incidents")
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}

/// Where to reach the incident server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: Option<u16>,
    pub tls: bool,
    /// Path of the API root on the server.
    pub path: String,
    pub username: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            tls: true,
            path: "/".to_string(),
            username: None,
            user_agent: None,
        }
    }
}

impl ServerConfig {
    /// `scheme://host[:port]/path/`
    pub fn base_url(&self) -> ConfigResult<Url> {
        let scheme = if self.tls { "https" } else { "http" };
        let authority = match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        };

        let mut path = self.path.trim().to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if !path.ends_with('/') {
            path.push('/');
        }

        let url = format!("{}://{}{}", scheme, authority, path);
        Url::parse(&url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))
    }
}

/// How often and how patiently to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub reload_interval: Duration,
    /// Whether to reload automatically every `reload_interval`.
    pub reload_timer: bool,
    pub idle_timeout: Duration,
    pub timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            reload_timer: true,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `incidents=debug`.
    pub level: String,
    /// When set, logs are also written to daily files in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields the defaults.
    pub fn load() -> ConfigResult<Self> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::ReadFailed {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Save to the default path, creating its directory.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save to a specific file, creating its directory.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    /// HTTP session settings derived from `[server]` and `[sync]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            user_agent: self.server.user_agent.clone(),
            idle_timeout: self.sync.idle_timeout,
            timeout: self.sync.timeout,
        }
    }
}

/// A single `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerHost,
    ServerPort,
    ServerTls,
    ServerPath,
    ServerUsername,
    ServerUserAgent,
    SyncReloadInterval,
    SyncReloadTimer,
    SyncIdleTimeout,
    SyncTimeout,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::ServerHost,
            Self::ServerPort,
            Self::ServerTls,
            Self::ServerPath,
            Self::ServerUsername,
            Self::ServerUserAgent,
            Self::SyncReloadInterval,
            Self::SyncReloadTimer,
            Self::SyncIdleTimeout,
            Self::SyncTimeout,
            Self::LoggingLevel,
            Self::LoggingDirectory,
        ]
    }

    pub fn section(self) -> &'static str {
        match self {
            Self::ServerHost
            | Self::ServerPort
            | Self::ServerTls
            | Self::ServerPath
            | Self::ServerUsername
            | Self::ServerUserAgent => "server",
            Self::SyncReloadInterval
            | Self::SyncReloadTimer
            | Self::SyncIdleTimeout
            | Self::SyncTimeout => "sync",
            Self::LoggingLevel | Self::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(self) -> &'static str {
        match self {
            Self::ServerHost => "host",
            Self::ServerPort => "port",
            Self::ServerTls => "tls",
            Self::ServerPath => "path",
            Self::ServerUsername => "username",
            Self::ServerUserAgent => "user_agent",
            Self::SyncReloadInterval => "reload_interval",
            Self::SyncReloadTimer => "reload_timer",
            Self::SyncIdleTimeout => "idle_timeout",
            Self::SyncTimeout => "timeout",
            Self::LoggingLevel => "level",
            Self::LoggingDirectory => "directory",
        }
    }

    /// `section.key`
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(self, config: &ConfigFile) -> String {
        match self {
            Self::ServerHost => config.server.host.clone(),
            Self::ServerPort => config.server.port.map(|p| p.to_string()).unwrap_or_default(),
            Self::ServerTls => config.server.tls.to_string(),
            Self::ServerPath => config.server.path.clone(),
            Self::ServerUsername => config.server.username.clone().unwrap_or_default(),
            Self::ServerUserAgent => config.server.user_agent.clone().unwrap_or_default(),
            Self::SyncReloadInterval => config.sync.reload_interval.as_secs().to_string(),
            Self::SyncReloadTimer => config.sync.reload_timer.to_string(),
            Self::SyncIdleTimeout => config.sync.idle_timeout.as_secs().to_string(),
            Self::SyncTimeout => config.sync.timeout.as_secs().to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store a value. An empty value clears optional settings.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> ConfigResult<()> {
        let value = value.trim();
        match self {
            Self::ServerHost => {
                if value.is_empty() {
                    return Err(self.invalid(value, "host must not be empty"));
                }
                config.server.host = value.to_string();
            }
            Self::ServerPort => config.server.port = self.parse_optional(value)?,
            Self::ServerTls => config.server.tls = self.parse_bool(value)?,
            Self::ServerPath => config.server.path = value.to_string(),
            Self::ServerUsername => config.server.username = optional_text(value),
            Self::ServerUserAgent => config.server.user_agent = optional_text(value),
            Self::SyncReloadInterval => config.sync.reload_interval = self.parse_seconds(value)?,
            Self::SyncReloadTimer => config.sync.reload_timer = self.parse_bool(value)?,
            Self::SyncIdleTimeout => config.sync.idle_timeout = self.parse_seconds(value)?,
            Self::SyncTimeout => config.sync.timeout = self.parse_seconds(value)?,
            Self::LoggingLevel => {
                config.logging.level = if value.is_empty() {
                    DEFAULT_LOG_LEVEL.to_string()
                } else {
                    value.to_string()
                }
            }
            Self::LoggingDirectory => config.logging.directory = optional_text(value).map(PathBuf::from),
        }
        Ok(())
    }

    fn invalid(self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section(),
            key: self.key_name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_optional<T>(self, value: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn parse_seconds(self, value: &str) -> ConfigResult<Duration> {
        let seconds: u64 = value
            .parse()
            .map_err(|e: std::num::ParseIntError| self.invalid(value, e.to_string()))?;
        if seconds == 0 {
            return Err(self.invalid(value, "must be at least 1 second"));
        }
        Ok(Duration::from_secs(seconds))
    }

    fn parse_bool(self, value: &str) -> ConfigResult<bool> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }
}

fn optional_text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
