//! CLI integration tests
//!
//! End-to-end tests for CLI commands using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn netweave_cmd() -> Command {
    let mut cmd = Command::cargo_bin("netweave").unwrap();
    cmd.env_remove("NETWEAVE_CONFIG");
    cmd
}

fn link_intent(a: &str, b: &str) -> String {
    json!({
        "target": "link-42",
        "intent-type": "ip-link",
        "config": {
            "endpoint-a": {"ne-id": a, "port-id": "1/1/1"},
            "endpoint-b": {"ne-id": b, "port-id": "1/1/2"}
        }
    })
    .to_string()
}

#[test]
fn test_version_output() {
    netweave_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netweave"));
}

#[test]
fn test_help_shows_all_commands() {
    netweave_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pools"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_config_init_then_pools() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("netweave.toml");

    netweave_cmd()
        .args(["config", "init", "-o"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));

    netweave_cmd()
        .args(["pools", "--json", "-c"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("ip-pool"))
        .stdout(predicate::str::contains("svc-id"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("netweave.toml");
    std::fs::write(&config_path, "existing").unwrap();

    netweave_cmd()
        .args(["config", "init", "-o"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_pools_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();

    netweave_cmd()
        .args(["pools", "-c"])
        .arg(temp_dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_validate_valid_intent() {
    let temp_dir = TempDir::new().unwrap();
    let intent_path = temp_dir.path().join("link.json");
    std::fs::write(&intent_path, link_intent("ne-1", "ne-2")).unwrap();

    netweave_cmd()
        .arg("validate")
        .arg(&intent_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("link-42"));
}

#[test]
fn test_validate_reports_inconsistency() {
    let temp_dir = TempDir::new().unwrap();
    let intent_path = temp_dir.path().join("link.json");
    std::fs::write(&intent_path, link_intent("ne-1", "ne-1")).unwrap();

    netweave_cmd()
        .args(["validate", "--json"])
        .arg(&intent_path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Value inconsistency"))
        .stderr(predicate::str::contains("1 problem"));
}

#[test]
fn test_completions_bash() {
    netweave_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("netweave"));
}
