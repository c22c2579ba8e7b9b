//! `masc_config` - Configuration parsing and validation for masc
//!
//! This crate provides:
//! - TOML configuration parsing
//! - Default value handling
//! - Environment variable overrides
//! - Path expansion (`~/` to home directory)
//! - Auto-discovery from standard config paths
//! - The target (database server) inventory

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Unknown host: {0}")]
    UnknownHost(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MascConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// Collector settings
    pub collector: CollectorConfig,

    /// Target inventory, in declaration order
    pub hosts: Vec<Target>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Directory holding `job_<id>/<host>/` run archives
    pub runs_dir: PathBuf,

    /// Path to `DuckDB` job database
    pub db_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            runs_dir: default_data_dir().join("runs"),
            db_path: default_data_dir().join("masc.duckdb"),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("masc")
}

/// Expand tilde in path to home directory
#[must_use]
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" && let Some(home) = dirs::home_dir() {
        return home;
    }
    path.to_path_buf()
}

impl GlobalConfig {
    pub fn expand_paths(&mut self) {
        self.runs_dir = expand_path(&self.runs_dir);
        self.db_path = expand_path(&self.db_path);
    }
}

/// How the diagnostic commands of one target are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// One concurrent client per command
    #[default]
    Parallel,
    /// One command at a time, stopping at the first failure
    Sequential,
}

/// Which command failures fail a whole target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPolicy {
    /// Any failed command fails the target
    #[default]
    AllCommands,
    /// Replica/primary status failures are tolerated
    RoleChecksOptional,
}

/// Collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Client binary invoked for every command
    pub client: String,

    /// Per-command timeout in seconds
    pub timeout_secs: u64,

    pub mode: CollectionMode,

    pub policy: CollectionPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            client: "mysql".to_string(),
            timeout_secs: 120,
            mode: CollectionMode::Parallel,
            policy: CollectionPolicy::AllCommands,
        }
    }
}

/// A database server to collect from
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    /// Stable identifier, used for archive paths and job records
    pub id: String,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Hostname or IP address
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub user: String,

    /// Credential, handed to the client through `MYSQL_PWD`
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Physical memory of the server, used to judge buffer pool sizing
    #[serde(default)]
    pub total_memory_bytes: Option<u64>,
}

fn default_port() -> u16 {
    3306
}

impl Target {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            host: host.into(),
            port: default_port(),
            user: user.into(),
            password: String::new(),
            total_memory_bytes: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_total_memory(mut self, bytes: u64) -> Self {
        self.total_memory_bytes = Some(bytes);
        self
    }

    /// Label for display, falling back to the identifier
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// `host:port` as shown in transcripts
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("total_memory_bytes", &self.total_memory_bytes)
            .finish()
    }
}

impl MascConfig {
    /// Standard config file paths, in order of precedence
    #[must_use]
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("masc.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("masc").join("masc.toml"));
        }

        paths.push(PathBuf::from("/etc/masc/masc.toml"));

        paths
    }

    /// Discover and load configuration from standard paths.
    ///
    /// Returns defaults if no config file is found.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a discovered config file cannot be loaded.
    pub fn discover() -> Result<Self, ConfigError> {
        for path in Self::config_paths() {
            if path.exists() {
                info!(path = %path.display(), "Loading config from");
                return Self::load(&path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Discover config and apply environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if config discovery or validation fails.
    pub fn discover_with_env() -> Result<Self, ConfigError> {
        let mut config = Self::discover()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the text cannot be parsed or validated.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: MascConfig = toml::from_str(content)?;
        config.global.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        info!(path = %path.display(), "Loading config from");
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MASC_RUNS_DIR") {
            self.global.runs_dir = expand_path(&PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("MASC_DB_PATH") {
            self.global.db_path = expand_path(&PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("MASC_LOG_LEVEL") {
            self.global.log_level = val;
        }

        if let Ok(val) = std::env::var("MASC_CLIENT") {
            self.collector.client = val;
        }

        if let Ok(val) = std::env::var("MASC_TIMEOUT_SECS")
            && let Ok(secs) = val.parse()
        {
            self.collector.timeout_secs = secs;
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when validation rules are violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "collector timeout_secs must be > 0".to_string(),
            ));
        }

        if self.collector.client.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "collector client must not be empty".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.global.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.global.log_level,
                valid_levels.join(", ")
            )));
        }

        let mut seen = HashSet::new();
        for target in &self.hosts {
            if target.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "host id must not be empty".to_string(),
                ));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate host id '{}'",
                    target.id
                )));
            }
            if target.port == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Host '{}' has port 0",
                    target.id
                )));
            }
            if target.host.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Host '{}' is missing an address",
                    target.id
                )));
            }
        }

        Ok(())
    }

    /// Get collector timeout as Duration
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.timeout_secs)
    }

    /// Look up a target by identifier
    #[must_use]
    pub fn host(&self, id: &str) -> Option<&Target> {
        self.hosts.iter().find(|t| t.id == id)
    }

    /// Resolve a list of identifiers, or every target when the list is empty.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownHost`] for the first identifier not in the inventory.
    pub fn select_hosts(&self, ids: &[String]) -> Result<Vec<Target>, ConfigError> {
        if ids.is_empty() {
            return Ok(self.hosts.clone());
        }
        ids.iter()
            .map(|id| {
                self.host(id)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownHost(id.clone()))
            })
            .collect()
    }
}
