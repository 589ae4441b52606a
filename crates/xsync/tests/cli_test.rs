//! Integration tests for the `xsync` CLI binary.
//!
//! These tests cover argument parsing, help output, shell completions,
//! configuration handling and error exit codes, all without a running Xray
//! server or feed.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `xsync` binary with env isolation.
///
/// Points HOME and XDG_CONFIG_HOME at a nonexistent path and clears the
/// config env overrides so tests never touch a real configuration.
fn xsync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("xsync");
    cmd.env("HOME", "/tmp/xsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/xsync-cli-test-nonexistent")
        .env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("XSYNC_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// `xsync_cmd` bound to a config file inside `dir`.
fn with_config(dir: &Path, toml: &str) -> (assert_cmd::Command, std::path::PathBuf) {
    let path = dir.join("config.toml");
    fs::write(&path, toml).unwrap();
    let mut cmd = xsync_cmd();
    cmd.arg("--config").arg(&path);
    (cmd, path)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = xsync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    xsync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("sync")
            .and(predicate::str::contains("bulk-add"))
            .and(predicate::str::contains("add"))
            .and(predicate::str::contains("del"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    xsync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("xsync"));
}

#[test]
fn test_sync_help_documents_flags() {
    xsync_cmd().args(["sync", "--help"]).assert().success().stdout(
        predicate::str::contains("--feed-url")
            .and(predicate::str::contains("--reseed"))
            .and(predicate::str::contains("--idempotency"))
            .and(predicate::str::contains("--interval")),
    );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    xsync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_invalid_shell() {
    xsync_cmd()
        .args(["completions", "tcsh"])
        .assert()
        .failure()
        .code(2);
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_add_requires_a_tag() {
    let output = xsync_cmd()
        .args(["add", "a@example.com", "--uuid", "u-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--tag"));
}

#[test]
fn test_invalid_mode_flag_is_usage_error() {
    xsync_cmd()
        .args(["sync", "--mode", "mirror"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_invalid_interval_is_usage_error() {
    xsync_cmd()
        .args(["sync", "--interval", "soon"])
        .assert()
        .failure()
        .code(2);
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    xsync_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    xsync_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[xray]"), "unexpected config:\n{written}");

    xsync_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    xsync_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_redacts_token() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(
        dir.path(),
        "[feed]\nurl = \"https://panel.example/feed\"\ntoken = \"s3cret-token\"\n",
    );
    cmd.args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("s3cret").not()));
}

#[test]
fn test_config_show_json_merges_env_and_flags() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "[sync]\nconcurrency = 4\n");
    let output = cmd
        .env("XSYNC_SYNC__RETRIES", "7")
        .args(["--xray", "10.1.2.3:9000", "-o", "json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["xray"]["address"], "10.1.2.3:9000");
    assert_eq!(value["sync"]["concurrency"], 4);
    assert_eq!(value["sync"]["retries"], 7);
}

// ── Sync errors ─────────────────────────────────────────────────────

#[test]
fn test_sync_without_token_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "");
    cmd.arg("sync")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No feed token"));
}

#[test]
fn test_sync_without_feed_url_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "");
    cmd.args(["sync", "--token", "t", "--server-id", "srv"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("feed.url"));
}

#[test]
fn test_invalid_mode_in_config_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "[sync]\nmode = \"mirror\"\n");
    cmd.args([
        "sync",
        "--token",
        "t",
        "--feed-url",
        "http://127.0.0.1:1/feed",
        "--server-id",
        "srv",
    ])
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("sync.mode"));
}

#[test]
fn test_unreachable_feed_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "");
    cmd.args([
        "sync",
        "--token",
        "t",
        "--feed-url",
        "http://127.0.0.1:1/feed",
        "--server-id",
        "srv",
    ])
    .arg("--db")
    .arg(dir.path().join("users.json"))
    .arg("--snapshots")
    .arg(dir.path().join("snapshots"))
    .assert()
    .failure()
    .code(7);
    assert!(!dir.path().join("snapshots").exists());
}

// ── User commands ───────────────────────────────────────────────────

#[test]
fn test_add_against_closed_port_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "");
    let store = dir.path().join("users.vless.json");
    cmd.args([
        "-x",
        "127.0.0.1:1",
        "add",
        "a@example.com",
        "--uuid",
        "5f0c9b8e-0000-4000-8000-000000000001",
        "--tag",
        "in-1",
        "--store",
    ])
    .arg(&store)
    .assert()
    .failure()
    .code(7)
    .stderr(predicate::str::contains("127.0.0.1:1"));

    // nothing was applied, so nothing was recorded
    assert!(!store.exists());
}

#[test]
fn test_bulk_add_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = with_config(dir.path(), "");
    cmd.args(["bulk-add", "/nonexistent/users.csv", "--tag", "in-1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("users.csv"));
}

#[test]
fn test_bulk_add_rejects_unknown_default_protocol() {
    xsync_cmd()
        .args(["bulk-add", "users.csv", "--tag", "in-1", "--proto", "trojan"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_bulk_add_with_only_bad_rows_reports_them() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("users.csv");
    fs::write(
        &csv,
        "# email,uuid,protocol\na@example.com,u-1,trojan\nb@example.com\n",
    )
    .unwrap();

    let (mut cmd, _) = with_config(dir.path(), "");
    cmd.args(["-x", "127.0.0.1:1", "-o", "plain", "bulk-add"])
        .arg(&csv)
        .args(["--tag", "in-1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("added=0")
                .and(predicate::str::contains("unknown protocol 'trojan'"))
                .and(predicate::str::contains("email and uuid are required")),
        );
}
