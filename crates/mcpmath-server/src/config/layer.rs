use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use mcpmath_common::rate_limit::Rate;

use super::settings::{LogLevel, ServerConfig, TransportKind};
use super::ConfigError;
use crate::cache::CacheStrategy;

/// Prefix shared by every configuration environment variable.
pub const ENV_PREFIX: &str = "MCP_MATH_";

/// Config file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub(crate) fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Ok(FileFormat::Json),
            Some("toml") => Ok(FileFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// One configuration source with every axis optional.
///
/// Layers are merged field by field: a value set in a higher layer replaces
/// the lower one, unset fields fall through.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub transport: Option<TransportKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub enable_cors: Option<bool>,
    pub allowed_origins: Option<Vec<String>>,
    pub log_level: Option<LogLevel>,
    pub server_name: Option<String>,
    pub server_description: Option<String>,
    pub domain_whitelist: Option<Vec<String>>,
    pub domain_blacklist: Option<Vec<String>>,
    pub category_whitelist: Option<Vec<String>>,
    pub category_blacklist: Option<Vec<String>>,
    pub function_whitelist: Option<Vec<String>>,
    pub function_blacklist: Option<Vec<String>>,
    pub cache_strategy: Option<CacheStrategy>,
    pub cache_size: Option<usize>,
    pub smart_cache_window: Option<usize>,
    /// Seconds
    pub computation_timeout: Option<f64>,
    pub max_concurrent_calls: Option<usize>,
    pub rate_limit: Option<Rate>,
}

impl ConfigLayer {
    /// Loads a `.json` or `.toml` file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = FileFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match format {
            FileFormat::Json => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string())),
            FileFormat::Toml => toml::from_str(&text).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Reads `MCP_MATH_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_vars(std::env::vars())
    }

    /// Builds a layer from `(name, value)` pairs.
    ///
    /// Lists are comma separated, booleans accept `true/false/1/0/yes/no/on/off`
    /// and `MCP_MATH_TIMEOUT` is in (fractional) seconds. Variables without the
    /// prefix are ignored, unknown ones with the prefix too.
    pub fn from_env_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(axis) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match axis {
                "TRANSPORT" => layer.transport = Some(parse_env(key, value)?),
                "HOST" => layer.host = Some(value.trim().to_string()),
                "PORT" => layer.port = Some(parse_env(key, value)?),
                "ENABLE_CORS" => layer.enable_cors = Some(parse_bool(key, value)?),
                "ALLOWED_ORIGINS" => layer.allowed_origins = Some(split_list(value)),
                "LOG_LEVEL" => layer.log_level = Some(parse_env(key, value)?),
                "SERVER_NAME" => layer.server_name = Some(value.to_string()),
                "SERVER_DESCRIPTION" => layer.server_description = Some(value.to_string()),
                "DOMAIN_WHITELIST" => layer.domain_whitelist = Some(split_list(value)),
                "DOMAIN_BLACKLIST" => layer.domain_blacklist = Some(split_list(value)),
                "CATEGORY_WHITELIST" => layer.category_whitelist = Some(split_list(value)),
                "CATEGORY_BLACKLIST" => layer.category_blacklist = Some(split_list(value)),
                "FUNCTION_WHITELIST" => layer.function_whitelist = Some(split_list(value)),
                "FUNCTION_BLACKLIST" => layer.function_blacklist = Some(split_list(value)),
                "CACHE_STRATEGY" => layer.cache_strategy = Some(parse_env(key, value)?),
                "CACHE_SIZE" => layer.cache_size = Some(parse_env(key, value)?),
                "SMART_CACHE_WINDOW" => layer.smart_cache_window = Some(parse_env(key, value)?),
                "TIMEOUT" | "COMPUTATION_TIMEOUT" => {
                    layer.computation_timeout = Some(parse_env(key, value)?)
                }
                "MAX_CONCURRENT" | "MAX_CONCURRENT_CALLS" => {
                    layer.max_concurrent_calls = Some(parse_env(key, value)?)
                }
                "RATE_LIMIT" => layer.rate_limit = Some(parse_env(key, value)?),
                _ => {}
            }
        }
        Ok(layer)
    }

    /// Merges `higher` over `self`.
    pub fn overlay(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            transport: higher.transport.or(self.transport),
            host: higher.host.or(self.host),
            port: higher.port.or(self.port),
            enable_cors: higher.enable_cors.or(self.enable_cors),
            allowed_origins: higher.allowed_origins.or(self.allowed_origins),
            log_level: higher.log_level.or(self.log_level),
            server_name: higher.server_name.or(self.server_name),
            server_description: higher.server_description.or(self.server_description),
            domain_whitelist: higher.domain_whitelist.or(self.domain_whitelist),
            domain_blacklist: higher.domain_blacklist.or(self.domain_blacklist),
            category_whitelist: higher.category_whitelist.or(self.category_whitelist),
            category_blacklist: higher.category_blacklist.or(self.category_blacklist),
            function_whitelist: higher.function_whitelist.or(self.function_whitelist),
            function_blacklist: higher.function_blacklist.or(self.function_blacklist),
            cache_strategy: higher.cache_strategy.or(self.cache_strategy),
            cache_size: higher.cache_size.or(self.cache_size),
            smart_cache_window: higher.smart_cache_window.or(self.smart_cache_window),
            computation_timeout: higher.computation_timeout.or(self.computation_timeout),
            max_concurrent_calls: higher.max_concurrent_calls.or(self.max_concurrent_calls),
            rate_limit: higher.rate_limit.or(self.rate_limit),
        }
    }

    /// Applies the set fields on top of `base`.
    pub fn apply_to(self, base: ServerConfig) -> Result<ServerConfig, ConfigError> {
        let computation_timeout = match self.computation_timeout {
            Some(secs) => seconds(secs)?,
            None => base.computation_timeout,
        };
        Ok(ServerConfig {
            transport: self.transport.unwrap_or(base.transport),
            host: self.host.unwrap_or(base.host),
            port: self.port.unwrap_or(base.port),
            enable_cors: self.enable_cors.unwrap_or(base.enable_cors),
            allowed_origins: self.allowed_origins.unwrap_or(base.allowed_origins),
            log_level: self.log_level.unwrap_or(base.log_level),
            server_name: self.server_name.unwrap_or(base.server_name),
            server_description: self.server_description.unwrap_or(base.server_description),
            domain_whitelist: self.domain_whitelist.unwrap_or(base.domain_whitelist),
            domain_blacklist: self.domain_blacklist.unwrap_or(base.domain_blacklist),
            category_whitelist: self.category_whitelist.unwrap_or(base.category_whitelist),
            category_blacklist: self.category_blacklist.unwrap_or(base.category_blacklist),
            function_whitelist: self.function_whitelist.unwrap_or(base.function_whitelist),
            function_blacklist: self.function_blacklist.unwrap_or(base.function_blacklist),
            cache_strategy: self.cache_strategy.unwrap_or(base.cache_strategy),
            cache_size: self.cache_size.unwrap_or(base.cache_size),
            smart_cache_window: self.smart_cache_window.unwrap_or(base.smart_cache_window),
            computation_timeout,
            max_concurrent_calls: self.max_concurrent_calls.unwrap_or(base.max_concurrent_calls),
            rate_limit: self.rate_limit.or(base.rate_limit),
        })
    }
}

fn seconds(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(
            "computation_timeout",
            format!("must be a positive number of seconds (got {})", secs),
        ));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::invalid("computation_timeout", e.to_string()))
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{}': {}", value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", value))),
    }
}

/// Splits a comma-separated list, dropping blanks. An empty string clears
/// the list.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
