//! Integration tests for the `recovery-props` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cli(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("recovery-props").expect("binary builds");
    cmd.env_remove("RUST_LOG")
        .env_remove("RECOVERY_PROPS_DATA_DIR")
        .arg("--data-dir")
        .arg(data_dir.path());
    cmd
}

#[test]
fn test_set_show_consume_cycle() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["set", "@alice/mail", r#"{"route":"/inbox","unread":3}"#])
        .assert()
        .success();

    cli(&dir)
        .args(["show", "@alice/mail"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""route": "/inbox""#));

    cli(&dir)
        .args(["consume", "@alice/mail"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""unread": 3"#));

    cli(&dir)
        .args(["consume", "@alice/mail"])
        .assert()
        .success()
        .stdout("null\n");
}

#[test]
fn test_set_rejects_non_object() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["set", "@alice/mail", "[1, 2]"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn test_set_reads_stdin() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["set", "@alice/mail", "-"])
        .write_stdin(r#"{"from":"stdin"}"#)
        .assert()
        .success();

    cli(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("@alice/mail"))
        .stdout(predicate::str::contains("stdin"));
}

#[test]
fn test_clear_all() {
    let dir = TempDir::new().unwrap();

    for id in ["@alice/mail", "@bob/chess"] {
        cli(&dir).args(["set", id, "{}"]).assert().success();
    }
    cli(&dir).args(["clear", "--all"]).assert().success();

    cli(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_default_experience_from_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"default_experience = "@bob/chess""#,
    )
    .unwrap();

    cli(&dir)
        .args(["set", "@bob/chess", r#"{"move":12}"#])
        .assert()
        .success();

    cli(&dir)
        .arg("consume")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""move": 12"#));
}

#[test]
fn test_missing_experience_fails() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .arg("show")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No experience given"));
}

#[test]
fn test_first_run_writes_example_config() {
    let dir = TempDir::new().unwrap();

    cli(&dir).arg("list").assert().success();
    let written = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert_eq!(written, recovery_props::config::EXAMPLE_CONFIG);
}

#[test]
fn test_cli_and_library_share_configured_database() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"database_file = "custom.db""#,
    )
    .unwrap();

    cli(&dir)
        .args(["set", "@alice/mail", r#"{"route":"/outbox"}"#])
        .assert()
        .success();

    assert!(dir.path().join("custom.db").exists());
    assert!(!dir
        .path()
        .join(recovery_props::config::DEFAULT_DATABASE_FILE)
        .exists());

    // An application opening through the same config sees the CLI's write
    let config = recovery_props::Config::load_from(&dir.path().join("config.toml"))
        .with_database_file(dir.path().join("custom.db"));
    let db = recovery_props::Database::open_with_config(&config).unwrap();
    let recovery = recovery_props::ErrorRecovery::new(
        recovery_props::RecoveryPropsStore::new(db.connection()),
        recovery_props::ExperienceId::new("@alice/mail").unwrap(),
    )
    .unwrap();
    assert_eq!(
        recovery.recovered_props().and_then(|p| p.get("route")),
        Some(&serde_json::json!("/outbox"))
    );
}

#[test]
fn test_invalid_config_warning_is_logged() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "log_filter = [").unwrap();

    cli(&dir).arg("list").assert().success();

    let log = fs::read_to_string(dir.path().join("logs").join("recovery-props.log")).unwrap();
    assert!(log.contains("Invalid config file"), "log was: {log}");
}
