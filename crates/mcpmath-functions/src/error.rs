use thiserror::Error;

/// Error raised while running a function.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The computation failed (domain error, overflow, ...)
    #[error("{0}")]
    Execution(String),

    /// The invocation noticed its deadline or cancellation at a checkpoint
    #[error("computation cancelled")]
    Cancelled,

    /// A bound argument had a value the function cannot use
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },
}

impl FunctionError {
    pub fn execution(message: impl Into<String>) -> Self {
        FunctionError::Execution(message.into())
    }

    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        FunctionError::InvalidArgument {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Error raised while binding arguments against a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("unknown argument '{0}'")]
    Unknown(String),

    #[error("missing required argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' must be {expected}, got {found}")]
    Type {
        name: String,
        expected: &'static str,
        found: String,
    },
}
