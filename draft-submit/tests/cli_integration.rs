//! CLI integration tests for draft-submit

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Create a throwaway config pointing at a temp database, with no
/// publisher section.
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("drafts.db");
    let config_path = temp_dir.path().join("config.toml");

    let config_content = format!(
        r#"
[database]
path = "{}"

[review]
prevent_self_approve = true
utc_offset_hours = 0
"#,
        db_path.to_string_lossy()
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

#[test]
fn test_help_documents_flags_and_exit_codes() {
    Command::cargo_bin("draft-submit")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--author"))
        .stdout(predicate::str::contains("--schedule"))
        .stdout(predicate::str::contains("--media"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_submit_works_without_publisher_credentials() {
    let (_tmp, config_path) = setup_test_env();

    Command::cargo_bin("draft-submit")
        .unwrap()
        .env("DRAFTGATE_CONFIG", &config_path)
        .args(["--author", "U_AUTHOR", "Release day!"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Submitted draft"));
}

#[test]
fn test_empty_text_exits_with_invalid_input() {
    let (_tmp, config_path) = setup_test_env();

    Command::cargo_bin("draft-submit")
        .unwrap()
        .env("DRAFTGATE_CONFIG", &config_path)
        .args(["--author", "U_AUTHOR", ""])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_past_schedule_exits_with_invalid_input() {
    let (_tmp, config_path) = setup_test_env();

    Command::cargo_bin("draft-submit")
        .unwrap()
        .env("DRAFTGATE_CONFIG", &config_path)
        .args([
            "--author",
            "U_AUTHOR",
            "--schedule",
            "2020-01-01 12:00",
            "too late",
        ])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("past"));
}
