//! Exit-status tests for the `line_notifier` binary.

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn line_notifier() -> Command {
    cargo_bin_cmd!("line_notifier")
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn help_exits_zero() {
    line_notifier()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CONFIG"));
}

#[test]
fn missing_config_argument_exits_one() {
    line_notifier()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CONFIG"));
}

#[test]
fn unreadable_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();

    line_notifier()
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn malformed_config_exits_one() {
    let file = config_file("{ not json");

    line_notifier()
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config file"));
}

#[test]
fn missing_apid_exits_one() {
    let file = config_file(r#"{"webhook_url": "https://example.org/hook", "game_id": "7"}"#);

    line_notifier()
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no apid configured"));
}

#[test]
fn non_positive_interval_exits_one() {
    let file = config_file(
        r#"{"webhook_url": "https://example.org/hook", "apid": "a", "game_id": "7", "refresh_interval": 0}"#,
    );

    line_notifier()
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid refresh interval"));
}
