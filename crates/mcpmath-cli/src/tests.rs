use super::*;
use mcpmath_functions::Catalog;
use mcpmath_server::config::{resolve, ConfigSources};
use mcpmath_server::CatalogFilter;

fn parse(args: &[&str]) -> Cli {
    Cli::from_args(&["mcpmath"], args).unwrap()
}

#[test]
fn test_cli_defaults_leave_layer_empty() {
    let cli = parse(&[]);
    assert_eq!(cli, Cli::default());
    assert_eq!(cli.to_layer().unwrap(), ConfigLayer::default());
}

#[test]
fn test_cli_parse_http_flags() {
    let cli = parse(&["-t", "http", "--host", "127.0.0.1", "-p", "9000", "--no-cors"]);
    let layer = cli.to_layer().unwrap();
    assert_eq!(layer.transport, Some(TransportKind::Http));
    assert_eq!(layer.host.as_deref(), Some("127.0.0.1"));
    assert_eq!(layer.port, Some(9000));
    assert_eq!(layer.enable_cors, Some(false));
}

#[test]
fn test_cli_parse_filters() {
    let cli = parse(&[
        "--domains", "arithmetic, number_theory",
        "--exclude-functions", "divide",
        "--categories", "primes",
    ]);
    let layer = cli.to_layer().unwrap();
    assert_eq!(
        layer.domain_whitelist,
        Some(vec!["arithmetic".to_string(), "number_theory".to_string()])
    );
    assert_eq!(layer.function_blacklist, Some(vec!["divide".to_string()]));
    assert_eq!(layer.category_whitelist, Some(vec!["primes".to_string()]));
    assert!(layer.domain_blacklist.is_none());
}

#[test]
fn test_cli_empty_list_clears_lower_layers() {
    let cli = parse(&["--domains", ""]);
    assert_eq!(cli.to_layer().unwrap().domain_whitelist, Some(Vec::new()));
}

#[test]
fn test_cli_parse_repeated_origins() {
    let cli = parse(&[
        "--allowed-origin", "https://a.example",
        "--allowed-origin", "https://b.example",
    ]);
    assert_eq!(
        cli.to_layer().unwrap().allowed_origins,
        Some(vec!["https://a.example".to_string(), "https://b.example".to_string()])
    );
}

#[test]
fn test_cli_parse_execution_flags() {
    let cli = parse(&[
        "--cache-strategy", "memory",
        "--cache-size", "50",
        "--timeout", "2.5",
        "--max-concurrent", "4",
        "--rate-limit", "120/min",
    ]);
    let layer = cli.to_layer().unwrap();
    assert_eq!(layer.cache_strategy, Some(CacheStrategy::Fixed));
    assert_eq!(layer.cache_size, Some(50));
    assert_eq!(layer.computation_timeout, Some(2.5));
    assert_eq!(layer.max_concurrent_calls, Some(4));
    assert_eq!(layer.rate_limit.unwrap().requests_per_second(), 2.0);
}

#[test]
fn test_cli_log_level_switches() {
    assert_eq!(parse(&["-v"]).to_layer().unwrap().log_level, Some(LogLevel::Debug));
    assert_eq!(parse(&["-q"]).to_layer().unwrap().log_level, Some(LogLevel::Warn));
    assert_eq!(
        parse(&["--log-level", "error", "-v"]).to_layer().unwrap().log_level,
        Some(LogLevel::Error)
    );
    assert!(parse(&["-v", "-q"]).to_layer().is_err());
}

#[test]
fn test_cli_rejects_bad_values() {
    assert!(parse(&["--transport", "carrier-pigeon"]).to_layer().is_err());
    assert!(parse(&["--cache-strategy", "lru"]).to_layer().is_err());
    assert!(parse(&["--rate-limit", "0/s"]).to_layer().is_err());
    assert!(parse(&["--log-level", "TRACE"]).to_layer().is_err());
}

#[test]
fn test_cli_rejects_non_numeric_port() {
    assert!(Cli::from_args(&["mcpmath"], &["--port", "http"]).is_err());
}

#[test]
fn test_cli_parse_inspection_flags() {
    let cli = parse(&["--show-config", "--save-config", "out.toml", "--list-functions", "-c", "in.json"]);
    assert!(cli.show_config);
    assert!(cli.list_functions);
    assert_eq!(cli.save_config, Some(PathBuf::from("out.toml")));
    assert_eq!(cli.config, Some(PathBuf::from("in.json")));
}

#[test]
fn test_cli_layer_beats_environment() {
    let catalog = Catalog::standard().unwrap();
    let sources = ConfigSources {
        file: None,
        env: ConfigLayer::from_env_vars([("MCP_MATH_PORT", "7000"), ("MCP_MATH_HOST", "10.0.0.1")])
            .unwrap(),
        cli: parse(&["--port", "7100"]).to_layer().unwrap(),
    };
    let config = resolve(&sources, &catalog).unwrap();
    assert_eq!(config.port, 7100);
    assert_eq!(config.host, "10.0.0.1");
}

#[test]
fn test_exit_codes() {
    let config = CliError::Config(ConfigError::invalid("port", "bad"));
    assert_eq!(config.exit_code(), ExitCode::from(2));

    let bind = CliError::Bind {
        addr: "127.0.0.1:1".into(),
        message: "denied".into(),
    };
    assert_eq!(bind.exit_code(), ExitCode::from(3));

    let runtime = CliError::Runtime(anyhow::anyhow!("boom"));
    assert_eq!(runtime.exit_code(), ExitCode::from(1));
}

#[test]
fn test_render_function_list() {
    let catalog = Catalog::standard().unwrap();
    let mut config = mcpmath_server::ServerConfig::default();
    config.function_whitelist = vec!["gcd".into(), "sin".into()];
    let exposed = CatalogFilter::from_config(&config).apply(&catalog);

    let text = render_function_list(&exposed);
    assert!(text.starts_with("2 functions exposed"));
    assert!(text.contains("[number_theory]"));
    assert!(text.contains("[trigonometry]"));
    assert!(text.contains("gcd"));
    assert!(!text.contains("add "));
}
