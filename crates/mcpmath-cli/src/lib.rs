// Copyright 2025 mcpmath Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # mcpmath CLI
//!
//! Command-line interface for the mcpmath server.
//!
//! The binary parses flags with `argh`, turns them into the command-line
//! [`ConfigLayer`], resolves it together with the config file and the
//! `MCP_MATH_*` environment, and starts the configured transport.
//!
//! ## Key Flags
//!
//! - `--transport local|http`: stdin/stdout channel or HTTP endpoint
//! - `--domains`, `--functions`, `--categories` (and their `--exclude-*`
//!   counterparts): comma-separated catalog filters
//! - `--show-config`, `--save-config PATH`, `--list-functions`: inspect the
//!   resolved setup and exit
//!
//! ## Exit Codes
//!
//! | code | meaning                                  |
//! |------|------------------------------------------|
//! | 0    | clean shutdown                           |
//! | 1    | runtime fault                            |
//! | 2    | invalid configuration or function catalog|
//! | 3    | the HTTP listener could not be bound     |

use argh::FromArgs;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use mcpmath_common::rate_limit::Rate;
use mcpmath_functions::CatalogError;
use mcpmath_server::cache::CacheStrategy;
use mcpmath_server::config::{split_list, ConfigError, ConfigLayer, LogLevel, TransportKind};
use mcpmath_server::ExposedCatalog;

#[cfg(test)]
mod tests;

/// mcpmath - configurable math function server for MCP clients
#[derive(FromArgs, Debug, Default, PartialEq)]
pub struct Cli {
    /// transport to serve: local (stdin/stdout) or http
    #[argh(option, short = 't')]
    pub transport: Option<String>,

    /// host the HTTP listener binds to
    #[argh(option)]
    pub host: Option<String>,

    /// port the HTTP listener binds to
    #[argh(option, short = 'p')]
    pub port: Option<u16>,

    /// disable permissive CORS headers on the HTTP transport
    #[argh(switch)]
    pub no_cors: bool,

    /// origin accepted on the call endpoint when CORS is disabled
    ///
    /// Can be given multiple times.
    #[argh(option, long = "allowed-origin")]
    pub allowed_origins: Vec<String>,

    /// comma-separated function names to expose
    #[argh(option)]
    pub functions: Option<String>,

    /// comma-separated function names to hide
    #[argh(option)]
    pub exclude_functions: Option<String>,

    /// comma-separated domains to expose
    #[argh(option)]
    pub domains: Option<String>,

    /// comma-separated domains to hide
    #[argh(option)]
    pub exclude_domains: Option<String>,

    /// comma-separated categories to expose
    #[argh(option)]
    pub categories: Option<String>,

    /// comma-separated categories to hide
    #[argh(option)]
    pub exclude_categories: Option<String>,

    /// result cache strategy: off, fixed or smart
    #[argh(option)]
    pub cache_strategy: Option<String>,

    /// maximum number of cached results
    #[argh(option)]
    pub cache_size: Option<usize>,

    /// computation timeout in seconds
    #[argh(option)]
    pub timeout: Option<f64>,

    /// maximum number of calls executing at once
    #[argh(option)]
    pub max_concurrent: Option<usize>,

    /// per-caller rate limit for tool calls, e.g. 10/s or 100/min
    #[argh(option)]
    pub rate_limit: Option<String>,

    /// log level: DEBUG, INFO, WARN or ERROR
    #[argh(option)]
    pub log_level: Option<String>,

    /// log at DEBUG level
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    /// log at WARN level
    #[argh(switch, short = 'q')]
    pub quiet: bool,

    /// path to a .json or .toml config file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// print the resolved configuration as JSON and exit
    #[argh(switch)]
    pub show_config: bool,

    /// write the resolved configuration to PATH (.json or .toml) and exit
    #[argh(option)]
    pub save_config: Option<PathBuf>,

    /// print the exposed functions and exit
    #[argh(switch)]
    pub list_functions: bool,
}

impl Cli {
    /// Converts the flags into the highest-precedence configuration layer.
    ///
    /// Flags that were not given stay unset so lower layers show through.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for values that do not parse, and
    /// when `--verbose` and `--quiet` are combined.
    pub fn to_layer(&self) -> Result<ConfigLayer, ConfigError> {
        let transport = self
            .transport
            .as_deref()
            .map(|v| v.parse::<TransportKind>())
            .transpose()
            .map_err(|e| ConfigError::invalid("--transport", e))?;
        let cache_strategy = self
            .cache_strategy
            .as_deref()
            .map(|v| v.parse::<CacheStrategy>())
            .transpose()
            .map_err(|e| ConfigError::invalid("--cache-strategy", e))?;
        let rate_limit = self
            .rate_limit
            .as_deref()
            .map(|v| v.parse::<Rate>())
            .transpose()
            .map_err(|e| ConfigError::invalid("--rate-limit", e))?;

        let log_level = match (&self.log_level, self.verbose, self.quiet) {
            (_, true, true) => {
                return Err(ConfigError::invalid(
                    "--verbose",
                    "cannot be combined with --quiet",
                ))
            }
            (Some(level), _, _) => Some(
                level
                    .parse::<LogLevel>()
                    .map_err(|e| ConfigError::invalid("--log-level", e))?,
            ),
            (None, true, false) => Some(LogLevel::Debug),
            (None, false, true) => Some(LogLevel::Warn),
            (None, false, false) => None,
        };

        Ok(ConfigLayer {
            transport,
            host: self.host.clone(),
            port: self.port,
            enable_cors: self.no_cors.then_some(false),
            allowed_origins: (!self.allowed_origins.is_empty()).then(|| self.allowed_origins.clone()),
            log_level,
            domain_whitelist: self.domains.as_deref().map(split_list),
            domain_blacklist: self.exclude_domains.as_deref().map(split_list),
            category_whitelist: self.categories.as_deref().map(split_list),
            category_blacklist: self.exclude_categories.as_deref().map(split_list),
            function_whitelist: self.functions.as_deref().map(split_list),
            function_blacklist: self.exclude_functions.as_deref().map(split_list),
            cache_strategy,
            cache_size: self.cache_size,
            computation_timeout: self.timeout,
            max_concurrent_calls: self.max_concurrent,
            rate_limit,
            ..Default::default()
        })
    }
}

/// Startup and runtime failures, each with its process exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("function catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::Catalog(_) => ExitCode::from(2),
            CliError::Bind { .. } => ExitCode::from(3),
            CliError::Runtime(_) => ExitCode::from(1),
        }
    }
}

/// Renders the exposed catalog for `--list-functions`, grouped by domain.
pub fn render_function_list(catalog: &ExposedCatalog) -> String {
    let mut out = format!("{} functions exposed\n", catalog.len());
    for domain in catalog.domains() {
        out.push_str(&format!("\n[{}]\n", domain));
        for function in catalog.iter().filter(|f| f.domain() == domain) {
            out.push_str(&format!(
                "  {:<22} {:<18} {}\n",
                function.name(),
                function.category(),
                function.description()
            ));
        }
    }
    out
}
