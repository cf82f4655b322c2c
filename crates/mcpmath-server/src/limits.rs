//! Execution limits applied to every call.

use std::time::Duration;

use crate::config::ServerConfig;

/// Per-call time budget.
///
/// # Example
///
/// ```
/// use mcpmath_server::ExecutionLimits;
/// use std::time::Duration;
///
/// let limits = ExecutionLimits::new().with_computation_timeout(Duration::from_secs(5));
///
/// // Clients may ask for less time, never for more
/// assert_eq!(limits.effective_timeout(Some(Duration::from_secs(1))), Duration::from_secs(1));
/// assert_eq!(limits.effective_timeout(Some(Duration::from_secs(60))), Duration::from_secs(5));
/// assert_eq!(limits.effective_timeout(None), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionLimits {
    /// Upper bound on slot wait plus execution for one call
    pub computation_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            computation_timeout: Duration::from_secs(30),
        }
    }
}

impl ExecutionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            computation_timeout: config.computation_timeout,
        }
    }

    pub fn with_computation_timeout(mut self, timeout: Duration) -> Self {
        self.computation_timeout = timeout;
        self
    }

    /// `min(requested, computation_timeout)`.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(requested) => requested.min(self.computation_timeout),
            None => self.computation_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.computation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_effective_timeout_clamps() {
        let limits = ExecutionLimits::new().with_computation_timeout(Duration::from_millis(10));
        assert_eq!(
            limits.effective_timeout(Some(Duration::from_secs(1))),
            Duration::from_millis(10)
        );
        assert_eq!(
            limits.effective_timeout(Some(Duration::from_millis(3))),
            Duration::from_millis(3)
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = ServerConfig::default();
        config.computation_timeout = Duration::from_millis(250);
        assert_eq!(
            ExecutionLimits::from_config(&config).computation_timeout,
            Duration::from_millis(250)
        );
    }
}
