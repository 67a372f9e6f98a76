use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
#[allow(deprecated)]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("blocksync").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
#[allow(deprecated)]
fn test_missing_api_key_is_startup_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("page.md"), "---\nremote_id: abc\n---\n\nBody\n").unwrap();

    let mut cmd = Command::cargo_bin("blocksync").unwrap();
    cmd.args(["push", "page.md"])
        .env_remove("NOTION_API_KEY")
        .current_dir(dir.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("NOTION_API_KEY not found"));
}

#[test]
#[allow(deprecated)]
fn test_push_without_header_fails_before_network() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.md"), "# Just notes\n").unwrap();

    let mut cmd = Command::cargo_bin("blocksync").unwrap();
    cmd.args(["push", "notes.md"])
        .env("NOTION_API_KEY", "dummy")
        .current_dir(dir.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no remote id"));
}

#[test]
#[allow(deprecated)]
fn test_diff_of_missing_file_reports_path() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".env"), "NOTION_API_KEY='from-env-file'\n").unwrap();

    let mut cmd = Command::cargo_bin("blocksync").unwrap();
    cmd.args(["diff", "absent.md"])
        .env_remove("NOTION_API_KEY")
        .current_dir(dir.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("absent.md"));
}

#[test]
#[allow(deprecated)]
fn test_invalid_page_id_is_rejected() {
    let dir = tempdir().unwrap();

    let mut cmd = Command::cargo_bin("blocksync").unwrap();
    cmd.args(["pull", "not a page!", "--output-dir", "out"])
        .env("NOTION_API_KEY", "dummy")
        .current_dir(dir.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid remote id"));
    assert!(!dir.path().join("out").exists());
}
