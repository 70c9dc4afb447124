//! CLI Integration Tests
//!
//! These tests run the `glance` binary and check its output. None of them
//! reach the network: they use `demo`, `show` against a temporary store,
//! `config`, and argument errors.
//!
//! ```
//! cargo test --package glance-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

use glance_store::ReadingStore;
use glance_types::{Reading, Trend};
use time::OffsetDateTime;

/// Run glance with an isolated config file and no credentials in the environment.
fn run_glance(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_glance"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("GLANCE_USERNAME")
        .env_remove("GLANCE_PASSWORD")
        .env_remove("GLANCE_CONFIG")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run glance binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    for command in ["check", "watch", "show", "demo", "config"] {
        assert!(text.contains(command), "help should list {command}");
    }
}

#[test]
fn test_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_check_help_mentions_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["check", "--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("--username"));
    assert!(text.contains("GLANCE_PASSWORD"));
    assert!(text.contains("--no-store"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["frobnicate"]);
    assert!(!output.status.success());
}

// =============================================================================
// Demo
// =============================================================================

#[test]
fn test_demo_text() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["--no-color", "demo"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "before first fetch:");
    assert_eq!(lines[1], "100  [##########] OLD");
    assert_eq!(lines[2], "after first fetch:");
    assert!(lines[3].starts_with(&format!("100 {}", Trend::Flat.symbol())));
    assert!(lines[3].ends_with("sec"), "{}", lines[3]);
}

#[test]
fn test_demo_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(
        &dir.path().join("config.toml"),
        &["demo", "--format", "json", "--history", "5"],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["value"], 100);
    assert_eq!(json["trend"], 4);
    assert_eq!(json["stale"], false);
    assert_eq!(json["band"], "in_range");
    assert_eq!(json["history"].as_array().unwrap().len(), 1);
    assert!(json.get("last_error").is_none());
}

// =============================================================================
// Show
// =============================================================================

#[test]
fn test_show_stored_readings() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("readings.db");
    let now = OffsetDateTime::now_utc();
    ReadingStore::new(&db)
        .save(&[
            Reading::new(120, Trend::Down, now - time::Duration::minutes(1)),
            Reading::new(132, Trend::Flat, now - time::Duration::minutes(6)),
        ])
        .unwrap();

    let output = run_glance(
        &dir.path().join("config.toml"),
        &[
            "show",
            "--database",
            db.to_str().unwrap(),
            "--format",
            "json",
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["value"], 120);
    assert_eq!(json["delta"], -12);
    assert_eq!(json["delta_string"], "-12");
    assert_eq!(json["stale"], false);
}

#[test]
fn test_show_empty_store_prints_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("missing.db");

    let output = run_glance(
        &dir.path().join("config.toml"),
        &["--no-color", "show", "--database", db.to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "100  [##########] OLD");
    assert!(!db.exists());
}

#[test]
fn test_show_drops_readings_older_than_a_day() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("readings.db");
    let now = OffsetDateTime::now_utc();
    ReadingStore::new(&db)
        .save(&[Reading::new(180, Trend::Up, now - time::Duration::hours(30))])
        .unwrap();

    let output = run_glance(
        &dir.path().join("config.toml"),
        &["show", "--database", db.to_str().unwrap(), "-f", "json"],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["value"], 100);
    assert_eq!(json["stale"], true);
    assert_eq!(json["age_string"], "OLD");
}

// =============================================================================
// Check without credentials
// =============================================================================

#[test]
fn test_check_without_username_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_glance(&dir.path().join("config.toml"), &["check", "--no-store"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No share username"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_init_show_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("nested").join("config.toml");

    let output = run_glance(&config, &["config", "init"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(config.exists());

    let output = run_glance(&config, &["config", "path"]);
    assert_eq!(stdout(&output).trim(), config.display().to_string());

    let output = run_glance(&config, &["config", "show"]);
    let text = stdout(&output);
    assert!(text.contains("[display]"));
    assert!(text.contains("below_range = 85"));

    let output = run_glance(&config, &["config", "init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("already exists"));
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[display]\nbelow_range = 300\nabove_range = 100\n").unwrap();

    let output = run_glance(&config, &["demo"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("display.below_range"));
}

#[test]
fn test_unparseable_config_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[display\n").unwrap();

    let output = run_glance(&config, &["demo"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to parse config file"));
}
