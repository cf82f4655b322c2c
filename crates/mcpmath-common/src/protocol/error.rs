use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::jsonrpc::{
    INVALID_PARAMS, METHOD_NOT_FOUND, RATE_LIMITED, SERVER_ERROR, TIMEOUT,
};

/// Infrastructure errors raised by transports and codecs.
///
/// Per-call failures (unknown function, timeout, ...) are not errors at this
/// level; they travel inside a [`CallResult`](super::CallResult) so the
/// caller receives them with its correlation id.
#[derive(Error, Debug)]
pub enum McpMathError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, McpMathError>;

/// Why a single call failed.
///
/// Every kind maps onto a JSON-RPC error code so both transports report it
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    /// The name is not in the exposed catalog
    UnknownFunction,
    /// Arguments failed schema validation
    InvalidArguments,
    /// The deadline passed while waiting for a slot or while executing
    Timeout,
    /// The function itself reported an error
    ExecutionError,
    /// The caller exceeded its request rate
    RateLimited,
}

impl CallErrorKind {
    /// JSON-RPC error code reported for this kind.
    pub fn code(&self) -> i32 {
        match self {
            CallErrorKind::UnknownFunction => METHOD_NOT_FOUND,
            CallErrorKind::InvalidArguments => INVALID_PARAMS,
            CallErrorKind::Timeout => TIMEOUT,
            CallErrorKind::ExecutionError => SERVER_ERROR,
            CallErrorKind::RateLimited => RATE_LIMITED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallErrorKind::UnknownFunction => "unknown_function",
            CallErrorKind::InvalidArguments => "invalid_arguments",
            CallErrorKind::Timeout => "timeout",
            CallErrorKind::ExecutionError => "execution_error",
            CallErrorKind::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
