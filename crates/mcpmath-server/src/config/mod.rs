//! Configuration Resolution
//!
//! Turns defaults, an optional config file, `MCP_MATH_*` environment variables
//! and command-line overrides into one validated [`ServerConfig`].
//!
//! # Precedence
//!
//! Highest first, merged field by field:
//!
//! 1. command line
//! 2. environment
//! 3. config file (`.json` or `.toml`)
//! 4. built-in defaults
//!
//! # Example
//!
//! ```
//! use mcpmath_functions::Catalog;
//! use mcpmath_server::config::{resolve, ConfigLayer, ConfigSources};
//!
//! let catalog = Catalog::standard().unwrap();
//! let sources = ConfigSources {
//!     file: None,
//!     env: ConfigLayer::from_env_vars([("MCP_MATH_PORT", "9000")]).unwrap(),
//!     cli: ConfigLayer { port: Some(9100), ..Default::default() },
//! };
//!
//! let config = resolve(&sources, &catalog).unwrap();
//! assert_eq!(config.port, 9100);
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod layer;
pub mod resolve;
pub mod settings;

pub use layer::{split_list, ConfigLayer, ENV_PREFIX};
pub(crate) use resolve::check_filter_targets;
pub use resolve::{resolve, ConfigSources};
pub use settings::{LogLevel, ServerConfig, TransportKind, MAX_TIMEOUT};

/// Why a configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config file format {} (expected .json or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("{axis} {names:?} matches nothing in the function catalog")]
    UnknownFilterTarget {
        axis: &'static str,
        names: Vec<String>,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
