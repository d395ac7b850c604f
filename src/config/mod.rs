//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on malformed values. Every setting
//! has a default, so an empty environment yields a usable config.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// What `shutdown` does with tasks still sitting in the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Let workers finish everything already queued, then cancel.
    #[default]
    Drain,
    /// Cancel immediately; queued tasks are reported as dropped.
    Cancel,
}

impl FromStr for ShutdownMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "drain" => Ok(ShutdownMode::Drain),
            "cancel" => Ok(ShutdownMode::Cancel),
            other => Err(format!("unknown shutdown mode: {other}")),
        }
    }
}

impl std::fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownMode::Drain => write!(f, "drain"),
            ShutdownMode::Cancel => write!(f, "cancel"),
        }
    }
}

/// Settings fixed when a pool is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers spawned by `start`.
    pub workers: usize,
    /// Maximum number of queued tasks before `submit` blocks.
    pub queue_capacity: usize,
    /// Per-task limit after which the task's context is cancelled.
    pub task_timeout: Option<Duration>,
    pub shutdown_mode: ShutdownMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            task_timeout: None,
            shutdown_mode: ShutdownMode::default(),
        }
    }
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Self::default()
        }
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn shutdown_mode(mut self, mode: ShutdownMode) -> Self {
        self.shutdown_mode = mode;
        self
    }

    /// Reject configurations a pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(Error::Config("task_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Process-level configuration: the pool plus the ambient settings around it.
#[derive(Debug, Clone)]
pub struct Config {
    pub pool: PoolConfig,
    /// Default deadline handed to `shutdown`.
    pub shutdown_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

/// On-disk shape of a config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    pool: PoolSection,
    shutdown_timeout_ms: Option<u64>,
    otel_endpoint: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PoolSection {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    task_timeout_ms: Option<u64>,
    shutdown_mode: Option<ShutdownMode>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            pool: PoolConfig {
                workers: optional_var("WORKPOOL_WORKERS")?.unwrap_or(DEFAULT_WORKERS),
                queue_capacity: optional_var("WORKPOOL_QUEUE_CAPACITY")?
                    .unwrap_or(DEFAULT_QUEUE_CAPACITY),
                task_timeout: optional_var::<u64>("WORKPOOL_TASK_TIMEOUT_MS")?
                    .map(Duration::from_millis),
                shutdown_mode: optional_var("WORKPOOL_SHUTDOWN_MODE")?.unwrap_or_default(),
            },
            shutdown_timeout: optional_var::<u64>("WORKPOOL_SHUTDOWN_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_timeout),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };
        config.pool.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad config: {e}")))?;
        let defaults = Self::default();

        let config = Self {
            pool: PoolConfig {
                workers: file.pool.workers.unwrap_or(defaults.pool.workers),
                queue_capacity: file
                    .pool
                    .queue_capacity
                    .unwrap_or(defaults.pool.queue_capacity),
                task_timeout: file.pool.task_timeout_ms.map(Duration::from_millis),
                shutdown_mode: file.pool.shutdown_mode.unwrap_or_default(),
            },
            shutdown_timeout: file
                .shutdown_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_timeout),
            otel_endpoint: file.otel_endpoint,
            log_level: file.log_level.unwrap_or(defaults.log_level),
        };
        config.pool.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
