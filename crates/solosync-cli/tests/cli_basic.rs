//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway config directory and
//! verify outputs. Nothing here talks to the API.

use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command with its config under `home` and return output.
fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_solosync"))
        .args(args)
        .env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("SOLOSYNC_ENV")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

#[test]
fn test_config_defaults() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(&home, &["config", "get", "preferences.announcements_enabled"]);
    assert_eq!(code, 0, "Config get failed");
    assert_eq!(stdout.trim(), "false");

    let (code, stdout, _) = run_cli(&home, &["config", "get", "cues.prep_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");
}

#[test]
fn test_config_set_persists() {
    let home = TempDir::new().unwrap();
    let (code, _, _) = run_cli(&home, &["config", "set", "preferences.audio_cues_enabled", "false"]);
    assert_eq!(code, 0, "Config set failed");

    let (code, stdout, _) = run_cli(&home, &["config", "get", "preferences.audio_cues_enabled"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "false");
}

#[test]
fn test_config_list_is_json() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(&home, &["config", "list"]);
    assert_eq!(code, 0, "Config list failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed.get("preferences").is_some());
    assert!(parsed.get("cues").is_some());
}

#[test]
fn test_config_reset() {
    let home = TempDir::new().unwrap();
    run_cli(&home, &["config", "set", "cues.prep_secs", "10"]);
    let (code, _, _) = run_cli(&home, &["config", "reset"]);
    assert_eq!(code, 0, "Config reset failed");

    let (_, stdout, _) = run_cli(&home, &["config", "get", "cues.prep_secs"]);
    assert_eq!(stdout.trim(), "3");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(&home, &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error: unknown key"));
}

#[test]
fn test_log_submit_rejects_bad_metric() {
    let home = TempDir::new().unwrap();
    let (code, _, _) = run_cli(
        &home,
        &["log", "submit", "3", "--difficulty", "3", "--metric", "passes"],
    );
    assert_ne!(code, 0);
}

#[test]
fn test_debug_logs_only_with_verbose() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(&home, &["config", "get", "cues.prep_secs"]);
    assert_eq!(code, 0);
    assert!(!stderr.contains("default config written"), "{stderr}");

    let (code, stdout, stderr) = run_cli(&home, &["-v", "config", "get", "cues.prep_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");
    assert!(stderr.contains("config loaded"), "{stderr}");
}
