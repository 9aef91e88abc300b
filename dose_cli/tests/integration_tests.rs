//! Integration tests for the dosectl binary.
//!
//! These tests verify end-to-end behavior including:
//! - Listing doses from a care plan
//! - Marking doses taken, including retries and error exit codes
//! - CSV export
//! - Care plan validation

use assert_cmd::Command;
use chrono::{DateTime, Utc};
use dose_core::DoseId;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CARE_PLAN: &str = r#"
[[access]]
user_id = "alice"
recipient_ids = ["mom"]

[[access]]
user_id = "bob"
recipient_ids = ["dad"]

[[medications]]
id = "med-1"
recipient_id = "mom"
name = "Lisinopril"

[[medications]]
id = "med-2"
recipient_id = "mom"
name = "Atorvastatin"
is_active = false
inactive_at = "2024-01-03T00:00:00Z"

[[schedules]]
id = "sch-1"
medication_id = "med-1"
recipient_id = "mom"
recurrence = "daily"
time_of_day = "08:00"
timezone = "America/New_York"
start_date = "2024-01-01"

[[schedules]]
id = "sch-2"
medication_id = "med-2"
recipient_id = "mom"
recurrence = "daily"
time_of_day = "21:00"
timezone = "America/New_York"
start_date = "2024-01-01"
"#;

/// Helper to create a test data directory with a care plan and empty config
fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("care_plan.toml"), CARE_PLAN).unwrap();
    fs::write(temp_dir.path().join("config.toml"), "").unwrap();
    temp_dir
}

/// Helper to get the CLI binary pointed at a test directory
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dosectl"));
    cmd.arg("--data-dir")
        .arg(dir)
        .arg("--config")
        .arg(dir.join("config.toml"));
    cmd
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn list_json(dir: &Path, user: &str, extra: &[&str]) -> Vec<Value> {
    let output = cli(dir)
        .args(["--user", user, "list", "--recipient", "mom", "--json"])
        .args(["--from", "2024-01-01T00:00:00Z", "--to", "2024-01-08T00:00:00Z"])
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).expect("valid JSON");
    parsed.as_array().expect("array").clone()
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("dosectl"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Medication dose schedule"));
}

#[test]
fn test_list_first_week() {
    let temp_dir = setup_test_dir();

    let doses = list_json(temp_dir.path(), "alice", &[]);

    assert_eq!(doses.len(), 7);
    let times: Vec<DateTime<Utc>> = doses
        .iter()
        .map(|d| d["scheduled_for"].as_str().unwrap().parse().unwrap())
        .collect();
    assert_eq!(times[0], utc("2024-01-01T13:00:00Z"));
    assert_eq!(times[6], utc("2024-01-07T13:00:00Z"));
    assert!(times.windows(2).all(|w| w[0] < w[1]));
    assert!(doses.iter().all(|d| d["status"] == "scheduled"));
    assert!(doses.iter().all(|d| d["medication_name"] == "Lisinopril"));
}

#[test]
fn test_list_table_output() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "alice", "list", "--recipient", "mom"])
        .args(["--from", "2024-01-01T00:00:00Z", "--days", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-01 13:00Z"))
        .stdout(predicate::str::contains("Lisinopril"))
        .stdout(predicate::str::contains("v1."));
}

#[test]
fn test_include_inactive_stops_at_cutoff() {
    let temp_dir = setup_test_dir();

    let doses = list_json(temp_dir.path(), "alice", &["--include-inactive"]);
    let statin: Vec<&Value> = doses
        .iter()
        .filter(|d| d["medication_id"] == "med-2")
        .collect();

    // Jan 1 21:00 EST is 02:00Z Jan 2; Jan 2 21:00 EST is past the cutoff
    assert_eq!(statin.len(), 1);
    assert_eq!(
        statin[0]["scheduled_for"].as_str().unwrap().parse::<DateTime<Utc>>().unwrap(),
        utc("2024-01-02T02:00:00Z")
    );
}

#[test]
fn test_take_then_list_shows_taken() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    let doses = list_json(dir, "alice", &[]);
    let dose_id = doses[2]["dose_id"].as_str().unwrap().to_string();

    cli(dir)
        .args(["--user", "alice", "take", dose_id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dose taken"))
        .stdout(predicate::str::contains("by alice"));

    let doses = list_json(dir, "alice", &[]);
    let taken: Vec<&Value> = doses.iter().filter(|d| d["status"] == "taken").collect();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0]["dose_id"], dose_id.as_str());
    assert_eq!(taken[0]["taken_by_user_id"], "alice");

    assert!(dir.join("taken.jsonl").exists());
}

#[test]
fn test_take_twice_keeps_first_timestamp() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let dose_id = DoseId::encode("sch-1", utc("2024-01-03T13:00:00Z"));

    let take = || -> Value {
        let output = cli(dir)
            .args(["--user", "alice", "take", dose_id.as_str(), "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).unwrap()
    };

    let first = take();
    let second = take();
    assert_eq!(first["taken_at"], second["taken_at"]);
    assert_eq!(first, second);

    let log = fs::read_to_string(dir.join("taken.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn test_take_error_exit_codes() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();

    cli(dir)
        .args(["--user", "alice", "take", "not-a-dose"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid dose id"));

    // bob has no access to mom's schedules
    let foreign = DoseId::encode("sch-1", utc("2024-01-03T13:00:00Z"));
    cli(dir)
        .args(["--user", "bob", "take", foreign.as_str()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Dose not found"));

    let after_cutoff = DoseId::encode("sch-2", utc("2024-01-06T02:00:00Z"));
    cli(dir)
        .args(["--user", "alice", "take", after_cutoff.as_str()])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("deactivated"));

    assert!(!dir.join("taken.jsonl").exists());
}

#[test]
fn test_invalid_window_rejected() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["--user", "alice", "list", "--recipient", "mom"])
        .args(["--from", "2024-01-08T00:00:00Z", "--to", "2024-01-01T00:00:00Z"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid window"));
}

#[test]
fn test_missing_user_is_config_error() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["list", "--recipient", "mom"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No user given"));
}

#[test]
fn test_user_from_config() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    fs::write(dir.join("config.toml"), "[caregiver]\nuser_id = \"alice\"\n").unwrap();

    cli(dir)
        .args(["list", "--recipient", "mom"])
        .args(["--from", "2024-01-01T00:00:00Z", "--days", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-02 13:00Z"));
}

#[test]
fn test_export_creates_csv() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let csv_path = dir.join("doses.csv");

    cli(dir)
        .args(["--user", "alice", "export", "--recipient", "mom", "--out"])
        .arg(&csv_path)
        .args(["--from", "2024-01-01T00:00:00Z", "--to", "2024-01-08T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 7 doses"));

    let csv_content = fs::read_to_string(&csv_path).expect("Failed to read CSV");
    assert!(csv_content.starts_with("dose_id,schedule_id"));
    assert_eq!(csv_content.lines().count(), 8);
}

#[test]
fn test_check_valid_plan() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 medications, 2 schedules"));
}

#[test]
fn test_check_reports_invalid_plan() {
    let temp_dir = setup_test_dir();
    let dir = temp_dir.path();
    let broken = CARE_PLAN.replace("\"08:00\"", "\"8am\"");
    fs::write(dir.join("care_plan.toml"), broken).unwrap();

    cli(dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed time of day '8am'"));
}
