//! Proxy configuration.

use crate::backend::{BackendAddr, DEFAULT_MAX_IDLE};
use crate::health::HealthConfig;
use crate::selector::DEFAULT_POINTS;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Main proxy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Proxy listener configuration.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Backend shard configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Shard selection configuration.
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Worker thread configuration.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// The result is not validated; call [`validate`](Self::validate) once
    /// any command line overrides have been applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Check that there is at least one backend, every address parses and
    /// no timing or ring setting is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_addrs()?;

        let nonzero = [
            ("backend.connect_timeout_ms", self.backend.connect_timeout_ms),
            ("selector.probe_interval_ms", self.selector.probe_interval_ms),
            ("selector.points", self.selector.points as u64),
        ];
        match nonzero.into_iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::ZeroValue(name)),
            None => Ok(()),
        }
    }

    /// Parsed backend addresses, in configured order.
    pub fn backend_addrs(&self) -> Result<Vec<BackendAddr>, ConfigError> {
        if self.backend.servers.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        self.backend
            .servers
            .iter()
            .map(|s| BackendAddr::parse(s).map_err(|_| ConfigError::InvalidAddress(s.clone())))
            .collect()
    }

    /// Get the number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.connect_timeout_ms)
    }

    pub fn health(&self) -> HealthConfig {
        HealthConfig {
            interval: Duration::from_millis(self.selector.probe_interval_ms),
            timeout: self.connect_timeout(),
        }
    }
}

/// Proxy listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Address to listen on for client connections.
    #[serde(default = "ProxyConfig::default_listen")]
    pub listen: SocketAddr,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
        }
    }
}

impl ProxyConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 11212))
    }
}

/// Backend shard configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Shard addresses: `host:port`, or a unix socket path.
    #[serde(default)]
    pub servers: Vec<String>,

    /// Idle connections kept per shard.
    #[serde(default = "BackendConfig::default_max_idle")]
    pub max_idle: usize,

    /// Connect timeout in milliseconds, for requests and health probes.
    #[serde(default = "BackendConfig::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            max_idle: Self::default_max_idle(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

impl BackendConfig {
    fn default_max_idle() -> usize {
        DEFAULT_MAX_IDLE
    }

    fn default_connect_timeout_ms() -> u64 {
        100
    }
}

/// How keys are mapped to shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Consistent hashing over healthy shards (default).
    #[default]
    Ketama,
    /// `crc32(key) % shards`, no health checks.
    Modulo,
}

/// Shard selection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorConfig {
    #[serde(default)]
    pub kind: SelectorKind,

    /// Ring ticks per shard. Only used by `ketama`.
    #[serde(default = "SelectorConfig::default_points")]
    pub points: usize,

    /// Time between health probes of each shard. Only used by `ketama`.
    #[serde(default = "SelectorConfig::default_probe_interval_ms")]
    pub probe_interval_ms: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            kind: SelectorKind::default(),
            points: Self::default_points(),
            probe_interval_ms: Self::default_probe_interval_ms(),
        }
    }
}

impl SelectorConfig {
    fn default_points() -> usize {
        DEFAULT_POINTS
    }

    fn default_probe_interval_ms() -> u64 {
        1000
    }
}

/// Worker thread configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkersConfig {
    /// Number of runtime worker threads. Defaults to number of CPUs.
    pub threads: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level, or any `EnvFilter` directive.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("No backend servers configured")]
    NoBackends,
    #[error("Invalid backend address: {0}")]
    InvalidAddress(String),
    #[error("Invalid value for {0}: must be greater than zero")]
    ZeroValue(&'static str),
}
