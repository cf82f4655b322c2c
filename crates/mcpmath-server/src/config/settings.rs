use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use mcpmath_common::rate_limit::Rate;

use super::ConfigError;
use crate::cache::CacheStrategy;

/// Longest accepted computation timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Which transport the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransportKind {
    /// Newline-delimited JSON over stdin/stdout
    Local,
    /// HTTP with optional server-sent event streaming
    Http,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "stdio" => Ok(TransportKind::Local),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport '{}' (expected local or http)", other)),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Local => "local",
            TransportKind::Http => "http",
        })
    }
}

impl TryFrom<String> for TransportKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TransportKind> for String {
    fn from(kind: TransportKind) -> Self {
        kind.to_string()
    }
}

/// Minimum level written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level '{}' (expected DEBUG, INFO, WARN or ERROR)",
                other
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, String> {
        s.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.to_string()
    }
}

/// The resolved, validated server policy.
///
/// Built once by [`resolve`](super::resolve) and shared read-only afterwards.
/// For every filter axis a non-empty whitelist is authoritative and the
/// blacklist of that axis is ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Origins accepted on the call endpoint when CORS is disabled
    pub allowed_origins: Vec<String>,
    pub log_level: LogLevel,
    pub server_name: String,
    pub server_description: String,
    pub domain_whitelist: Vec<String>,
    pub domain_blacklist: Vec<String>,
    pub category_whitelist: Vec<String>,
    pub category_blacklist: Vec<String>,
    pub function_whitelist: Vec<String>,
    pub function_blacklist: Vec<String>,
    pub cache_strategy: CacheStrategy,
    pub cache_size: usize,
    /// Recency window in which the smart cache prefers evicting cheap entries
    pub smart_cache_window: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub computation_timeout: Duration,
    pub max_concurrent_calls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<Rate>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Local,
            host: "0.0.0.0".into(),
            port: 8000,
            enable_cors: true,
            allowed_origins: Vec::new(),
            log_level: LogLevel::Info,
            server_name: "mcpmath".into(),
            server_description: "Configurable mathematical computation server".into(),
            domain_whitelist: Vec::new(),
            domain_blacklist: Vec::new(),
            category_whitelist: Vec::new(),
            category_blacklist: Vec::new(),
            function_whitelist: Vec::new(),
            function_blacklist: Vec::new(),
            cache_strategy: CacheStrategy::Smart,
            cache_size: 1000,
            smart_cache_window: 4,
            computation_timeout: Duration::from_secs(30),
            max_concurrent_calls: 10,
            rate_limit: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the HTTP listener.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Whether any filter axis narrows the catalog.
    pub fn filtering_active(&self) -> bool {
        [
            &self.domain_whitelist,
            &self.domain_blacklist,
            &self.category_whitelist,
            &self.category_blacklist,
            &self.function_whitelist,
            &self.function_blacklist,
        ]
        .iter()
        .any(|list| !list.is_empty())
    }

    /// Checks ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// - port is zero
    /// - computation timeout is zero or longer than one hour
    /// - max concurrent calls is zero
    /// - cache size is zero while caching is enabled
    /// - smart cache window is zero
    /// - rate limit is slower than one request per hour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }
        if self.computation_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "computation_timeout",
                "must be greater than zero",
            ));
        }
        if self.computation_timeout > MAX_TIMEOUT {
            return Err(ConfigError::invalid(
                "computation_timeout",
                format!(
                    "must be <= 1 hour (got {} seconds)",
                    self.computation_timeout.as_secs_f64()
                ),
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::invalid("max_concurrent_calls", "must be at least 1"));
        }
        if self.cache_strategy != CacheStrategy::Off && self.cache_size == 0 {
            return Err(ConfigError::invalid(
                "cache_size",
                "must be at least 1 unless cache_strategy is off",
            ));
        }
        if self.smart_cache_window == 0 {
            return Err(ConfigError::invalid("smart_cache_window", "must be at least 1"));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("host", "must not be empty"));
        }
        if let Some(rate) = &self.rate_limit {
            rate.validate()
                .map_err(|e| ConfigError::invalid("rate_limit", e))?;
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Writes the configuration as `.json` or `.toml`, chosen by extension.
    /// The file loads back through [`ConfigLayer::from_file`](super::ConfigLayer::from_file).
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = match super::layer::FileFormat::from_path(path)? {
            super::layer::FileFormat::Json => self.to_json_pretty()?,
            super::layer::FileFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
        };
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
