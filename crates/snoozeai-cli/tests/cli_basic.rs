//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory. The
//! backend URL points at a closed port, so remote calls fail fast and the
//! local-first paths are exercised.

use std::path::Path;
use std::process::Command;

/// Run a CLI command in `data_dir` and return (stdout, stderr, code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_snoozeai"))
        .env("SNOOZEAI_DATA_DIR", data_dir)
        .env("RUST_LOG", "error")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    stdout
}

fn offline_data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_ok(dir.path(), &["config", "set", "backend.base_url", "http://127.0.0.1:9"]);
    run_ok(dir.path(), &["config", "set", "retry.max_retries", "0"]);
    run_ok(dir.path(), &["config", "set", "backend.timeout_secs", "2"]);
    dir
}

#[test]
fn test_config_list_has_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_ok(dir.path(), &["config", "list"]);
    assert!(out.contains("backend.base_url = http://localhost:8000"));
    assert!(out.contains("sync.page_limit = 50"));
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    run_ok(dir.path(), &["config", "set", "worker.batch_size", "8"]);
    let out = run_ok(dir.path(), &["config", "get", "worker.batch_size"]);
    assert_eq!(out.trim(), "8");
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_settings_quiet_hours() {
    let dir = tempfile::tempdir().unwrap();
    run_ok(dir.path(), &["settings", "quiet", "22:00", "07:30"]);
    run_ok(dir.path(), &["settings", "minutes", "45"]);

    let out = run_ok(dir.path(), &["settings", "show", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["quiet_hours"]["enabled"], true);
    assert_eq!(json["default_snooze_minutes"], 45);

    let out = run_ok(dir.path(), &["settings", "quiet-off"]);
    assert!(out.contains("off"));
}

#[test]
fn test_settings_rejects_empty_window() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["settings", "quiet", "08:00", "08:00"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_snooze_lifecycle_offline() {
    let dir = offline_data_dir();

    run_ok(dir.path(), &["snooze", "new", "Dentist", "Call to confirm", "--minutes", "30"]);

    let out = run_ok(dir.path(), &["snooze", "list", "--json"]);
    let items: serde_json::Value = serde_json::from_str(&out).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Dentist");
    let id = items[0]["id"].as_str().unwrap().to_string();

    run_ok(dir.path(), &["snooze", "edit", &id, "--title", "Dentist (moved)"]);
    let out = run_ok(dir.path(), &["snooze", "list"]);
    assert!(out.contains("Dentist (moved)"));

    let out = run_ok(dir.path(), &["worker", "--once", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["delivered"], 0);

    run_ok(dir.path(), &["snooze", "delete", &id]);
    let out = run_ok(dir.path(), &["snooze", "list", "--json"]);
    assert_eq!(out.trim(), "[]");
}

#[test]
fn test_oversized_minutes_are_rejected() {
    let dir = offline_data_dir();

    let (_, stderr, code) = run_cli(dir.path(), &["settings", "minutes", "9223372036854775807"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, stderr, code) = run_cli(
        dir.path(),
        &["snooze", "new", "Renew passport", "Book appointment", "--minutes", "9223372036854775807"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("--minutes"));

    let out = run_ok(dir.path(), &["snooze", "list", "--json"]);
    assert_eq!(out.trim(), "[]");
}

#[test]
fn test_config_list_includes_retention() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_ok(dir.path(), &["config", "list"]);
    assert!(out.contains("worker.retention_secs = 604800"));
}

#[test]
fn test_snooze_delete_unknown_fails() {
    let dir = offline_data_dir();
    let (_, stderr, code) = run_cli(dir.path(), &["snooze", "delete", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_sync_fails_when_backend_unreachable() {
    let dir = offline_data_dir();
    let (_, stderr, code) = run_cli(dir.path(), &["sync"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_preview_reports_adjusted_time() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_ok(
        dir.path(),
        &["preview", "--at", "2025-03-10 12:00", "--start", "09:00", "--end", "17:00"],
    );
    assert!(out.contains("quiet hours: 09:00 - 17:00"));
    assert!(out.contains("resurfaces:  2025-03-10 17:00"));
}
