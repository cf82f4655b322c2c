//! CLI Integration Tests
//!
//! Runs the built `mcpmath` binary and checks its output and exit codes.
//!
//! Test Scenarios:
//! 1. Inspection flags (`--show-config`, `--save-config`, `--list-functions`)
//! 2. Configuration precedence across file, environment and flags
//! 3. Exit codes for configuration and bind failures
//! 4. A short session over the local channel

use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Output, Stdio};

// ============================================================================
// Test Helpers
// ============================================================================

/// A command for the binary with no `MCP_MATH_*` variables leaking in.
fn mcpmath() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mcpmath"));
    for (key, _) in std::env::vars() {
        if key.starts_with("MCP_MATH_") {
            command.env_remove(key);
        }
    }
    command.env_remove("RUST_LOG");
    command
}

fn run(args: &[&str]) -> Output {
    mcpmath().args(args).output().unwrap()
}

fn show_config(command: &mut Command) -> Value {
    let output = command.arg("--show-config").output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn config_file(extension: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// Inspection Flags
// ============================================================================

#[test]
fn test_show_config_defaults() {
    let config = show_config(&mut mcpmath());
    assert_eq!(config["transport"], json!("local"));
    assert_eq!(config["port"], json!(8000));
    assert_eq!(config["cache_strategy"], json!("smart"));
    assert_eq!(config["computation_timeout"], json!(30.0));
    assert_eq!(config["max_concurrent_calls"], json!(10));
}

#[test]
fn test_show_config_precedence() {
    let file = config_file(".toml", "port = 1111\nhost = \"10.0.0.1\"\ncache_size = 5\n");
    let config = show_config(
        mcpmath()
            .env("MCP_MATH_PORT", "2222")
            .env("MCP_MATH_HOST", "10.0.0.2")
            .args(["-c", file.path().to_str().unwrap(), "--port", "3333"]),
    );
    assert_eq!(config["port"], json!(3333));
    assert_eq!(config["host"], json!("10.0.0.2"));
    assert_eq!(config["cache_size"], json!(5));
}

#[test]
fn test_save_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");
    let path_str = path.to_str().unwrap();

    let output = run(&["--domains", "number_theory", "--cache-strategy", "fixed", "--save-config", path_str]);
    assert!(output.status.success());
    assert!(path.exists());

    let config = show_config(mcpmath().args(["-c", path_str]));
    assert_eq!(config["domain_whitelist"], json!(["number_theory"]));
    assert_eq!(config["cache_strategy"], json!("fixed"));
}

#[test]
fn test_list_functions() {
    let output = run(&["--domains", "trigonometry", "--list-functions"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[trigonometry]"));
    assert!(stdout.contains("sin"));
    assert!(!stdout.contains("[arithmetic]"));
}

#[test]
fn test_help_exits_cleanly() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--transport"));
}

// ============================================================================
// Exit Codes
// ============================================================================

#[test]
fn test_malformed_config_file_exits_2() {
    let file = config_file(".json", "{ \"port\": ");
    let output = run(&["-c", file.path().to_str().unwrap(), "--show-config"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_config_key_exits_2() {
    let file = config_file(".toml", "prot = 9000\n");
    let output = run(&["-c", file.path().to_str().unwrap(), "--show-config"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unsupported_config_format_exits_2() {
    let file = config_file(".yaml", "port: 9000\n");
    let output = run(&["-c", file.path().to_str().unwrap(), "--show-config"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported config file format"));
}

#[test]
fn test_invalid_values_exit_2() {
    assert_eq!(run(&["--timeout", "0"]).status.code(), Some(2));
    assert_eq!(run(&["--port", "0", "--show-config"]).status.code(), Some(2));
    assert_eq!(run(&["--max-concurrent", "0"]).status.code(), Some(2));
    assert_eq!(run(&["--port", "not-a-port"]).status.code(), Some(2));
}

#[test]
fn test_filter_matching_nothing_exits_2() {
    let output = run(&["--domains", "alchemy", "--show-config"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("alchemy"));
}

#[test]
fn test_bind_failure_exits_3() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let output = run(&["-t", "http", "--host", "127.0.0.1", "-p", &port]);
    assert_eq!(output.status.code(), Some(3));
}

// ============================================================================
// Local Channel
// ============================================================================

#[test]
fn test_local_session_until_eof() {
    let mut child = mcpmath()
        .args(["--functions", "gcd,is_prime", "-q"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    {
        let stdin = child.stdin.as_mut().unwrap();
        let requests = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "gcd", "arguments": {"a": 12, "b": 18}}}),
        ];
        for request in requests {
            writeln!(stdin, "{}", request).unwrap();
        }
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let responses: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 2);
    assert_eq!(responses[2]["result"]["structuredContent"]["result"], json!(6));
}
