use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use mcpmath_functions::Catalog;

use super::layer::ConfigLayer;
use super::settings::ServerConfig;
use super::ConfigError;

/// The three non-default configuration sources.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub file: Option<ConfigLayer>,
    pub env: ConfigLayer,
    pub cli: ConfigLayer,
}

impl ConfigSources {
    /// Reads the config file (when given) and the process environment.
    pub fn load(config_file: Option<&Path>, cli: ConfigLayer) -> Result<Self, ConfigError> {
        let file = config_file.map(ConfigLayer::from_file).transpose()?;
        Ok(Self {
            file,
            env: ConfigLayer::from_env()?,
            cli,
        })
    }

    /// All layers merged, command line on top.
    pub fn merged(&self) -> ConfigLayer {
        let base = self.file.clone().unwrap_or_default();
        base.overlay(self.env.clone()).overlay(self.cli.clone())
    }
}

/// Resolves the sources into a validated [`ServerConfig`].
///
/// Pure apart from logging: nothing is bound or spawned.
///
/// # Errors
///
/// - a value fails range validation
/// - a non-empty whitelist or blacklist names no domain, category or
///   function of `catalog` at all (partially unknown lists only warn)
pub fn resolve(sources: &ConfigSources, catalog: &Catalog) -> Result<ServerConfig, ConfigError> {
    let config = sources.merged().apply_to(ServerConfig::default())?;
    config.validate()?;
    check_filter_targets(&config, catalog)?;
    Ok(config)
}

/// Rejects a filter list whose names all miss `catalog`.
pub(crate) fn check_filter_targets(config: &ServerConfig, catalog: &Catalog) -> Result<(), ConfigError> {
    let domains: HashSet<&str> = catalog.domains().into_iter().collect();
    let categories: HashSet<&str> = catalog.categories().into_iter().collect();
    let functions: HashSet<&str> = catalog.iter().map(|f| f.name()).collect();

    let axes: [(&'static str, &[String], &HashSet<&str>); 6] = [
        ("domain_whitelist", &config.domain_whitelist, &domains),
        ("domain_blacklist", &config.domain_blacklist, &domains),
        ("category_whitelist", &config.category_whitelist, &categories),
        ("category_blacklist", &config.category_blacklist, &categories),
        ("function_whitelist", &config.function_whitelist, &functions),
        ("function_blacklist", &config.function_blacklist, &functions),
    ];

    for (axis, names, known) in axes {
        if names.is_empty() {
            continue;
        }
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();
        if unknown.len() == names.len() {
            return Err(ConfigError::UnknownFilterTarget {
                axis,
                names: unknown,
            });
        }
        if !unknown.is_empty() {
            warn!(axis, ?unknown, "Filter names not found in the catalog");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStrategy;
    use crate::config::TransportKind;
    use std::io::Write;
    use std::time::Duration;

    fn catalog() -> Catalog {
        Catalog::standard().unwrap()
    }

    #[test]
    fn test_defaults_only() {
        let config = resolve(&ConfigSources::default(), &catalog()).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let file = ConfigLayer {
            port: Some(1111),
            host: Some("10.0.0.1".into()),
            cache_size: Some(5),
            ..Default::default()
        };
        let env = ConfigLayer::from_env_vars([("MCP_MATH_PORT", "2222"), ("MCP_MATH_HOST", "10.0.0.2")])
            .unwrap();
        let cli = ConfigLayer {
            port: Some(3333),
            ..Default::default()
        };
        let sources = ConfigSources {
            file: Some(file),
            env,
            cli,
        };

        let config = resolve(&sources, &catalog()).unwrap();
        assert_eq!(config.port, 3333);
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.cache_size, 5);
        assert_eq!(config.cache_strategy, CacheStrategy::Smart);
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let sources = ConfigSources {
            cli: ConfigLayer {
                computation_timeout: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            resolve(&sources, &catalog()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_whitelist_naming_nothing_is_rejected() {
        let sources = ConfigSources {
            cli: ConfigLayer {
                function_whitelist: Some(vec!["no_such_fn".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = resolve(&sources, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownFilterTarget {
                axis: "function_whitelist",
                ..
            }
        ));
    }

    #[test]
    fn test_partially_unknown_names_are_accepted() {
        let sources = ConfigSources {
            cli: ConfigLayer {
                domain_blacklist: Some(vec!["trigonometry".into(), "astrology".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = resolve(&sources, &catalog()).unwrap();
        assert_eq!(config.domain_blacklist.len(), 2);
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"transport": "http", "computation_timeout": 0.5}}"#).unwrap();

        let sources = ConfigSources::load(Some(file.path()), ConfigLayer::default()).unwrap();
        let config = resolve(&sources, &catalog()).unwrap();
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.computation_timeout, Duration::from_millis(500));
    }
}
