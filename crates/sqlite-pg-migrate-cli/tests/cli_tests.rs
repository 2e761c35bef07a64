//! CLI integration tests for sqlite-pg-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no database server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the sqlite-pg-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("sqlite-pg-migrate").unwrap()
}

/// Write a config whose target is never reached before the source fails.
fn config_with_source(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  path: {}", source).unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  database: app").unwrap();
    writeln!(file, "  user: postgres").unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--target-schema"))
        .stdout(predicate::str::contains("--page-size"))
        .stdout(predicate::str::contains("--foreign-keys"))
        .stdout(predicate::str::contains("--row-fallback"))
        .stdout(predicate::str::contains("--keep-empty-strings"))
        .stdout(predicate::str::contains("--include"))
        .stdout(predicate::str::contains("--exclude"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite-pg-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_invalid_verbosity_exits_with_code_1() {
    cmd()
        .args(["--verbosity", "loud", "validate"])
        .assert()
        .code(1);
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  path: app.db").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_1() {
    let mut file = config_with_source("app.db");
    writeln!(file, "  ssl_mode: prefer").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_zero_page_size_override_exits_with_code_1() {
    let file = config_with_source("app.db");

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--page-size",
            "0",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("page_size"));
}

// =============================================================================
// Exit Code Tests - Connection Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_missing_source_file_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.db");
    let file = config_with_source(missing.to_str().unwrap());

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing.db"));
}

#[test]
fn test_source_override_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("override.db");
    let file = config_with_source("app.db");

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--source",
            missing.to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("override.db"));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_validate_command_exists() {
    cmd()
        .args(["validate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate row counts"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
