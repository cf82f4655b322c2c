//! # mcpmath Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve on stdin/stdout with the full catalog
//! mcpmath
//!
//! # HTTP on port 9000, number theory only, fixed cache
//! mcpmath -t http -p 9000 --domains number_theory --cache-strategy fixed
//!
//! # Inspect the resolved configuration
//! mcpmath -c server.toml --show-config
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use argh::FromArgs;
use mcpmath_cli::{render_function_list, Cli, CliError};
use mcpmath_common::McpMathError;
use mcpmath_functions::Catalog;
use mcpmath_server::config::{resolve, ConfigSources, LogLevel};
use mcpmath_server::{CatalogFilter, McpMathServer};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let strs: Vec<&str> = args.iter().map(String::as_str).collect();
    let (command, rest) = strs.split_first().map_or(("mcpmath", &[][..]), |(c, r)| (*c, r));

    // Flag errors are configuration errors too
    let cli = match Cli::from_args(&[command], rest) {
        Ok(cli) => cli,
        Err(early_exit) => {
            return match early_exit.status {
                Ok(()) => {
                    println!("{}", early_exit.output);
                    ExitCode::SUCCESS
                }
                Err(()) => {
                    eprintln!("{}", early_exit.output);
                    ExitCode::from(2)
                }
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let catalog = Catalog::standard()?;
    let sources = ConfigSources::load(cli.config.as_deref(), cli.to_layer()?)?;
    init_tracing(sources.merged().log_level.unwrap_or(LogLevel::Info));
    let config = resolve(&sources, &catalog)?;

    if cli.show_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }
    if let Some(path) = &cli.save_config {
        config.save(path)?;
        eprintln!("Configuration written to {}", path.display());
        return Ok(());
    }
    if cli.list_functions {
        print!("{}", render_function_list(&CatalogFilter::from_config(&config).apply(&catalog)));
        return Ok(());
    }

    tracing::info!(
        transport = %config.transport,
        cache = %config.cache_strategy,
        max_concurrent = config.max_concurrent_calls,
        timeout_secs = config.computation_timeout.as_secs_f64(),
        "Starting {}",
        config.server_name
    );

    let server = Arc::new(McpMathServer::new(config, catalog));
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupted, shutting down"),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
        }
    };

    server.run_until(interrupted).await.map_err(|e| match e {
        McpMathError::Bind { addr, source } => CliError::Bind {
            addr,
            message: source.to_string(),
        },
        other => CliError::Runtime(other.into()),
    })?;

    Ok(())
}

/// Logs go to stderr so stdout stays a clean protocol stream on the local
/// transport. `RUST_LOG` overrides the configured level.
fn init_tracing(level: LogLevel) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
