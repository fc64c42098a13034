//! Integration tests for the liftlog binary.
//!
//! Scripts and configuration are written to a temp dir; every run passes
//! `--config` so the user's own configuration is never read.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("config.toml"), "[timer]\ntick_millis = 10\n")
            .expect("Failed to write config");
        Self { dir }
    }

    fn write(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, lines.join("\n")).expect("Failed to write file");
        path
    }

    fn cli(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("liftlog"));
        cmd.arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .arg("--user")
            .arg("ann@example.com");
        cmd
    }
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout is not UTF-8")
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("liftlog"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Weightlifting session logger"));
}

#[test]
fn test_replay_mixed_units_total() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "Bench"}"#,
            r#"{"op": "update_set", "exercise": 0, "set": 1, "weight": 100, "unit": "kg", "reps": 5}"#,
            r#"{"op": "add_set", "exercise": 0}"#,
            r#"{"op": "update_set", "exercise": 0, "set": 2, "weight": 10, "unit": "lb", "reps": 10}"#,
        ],
    );

    ws.cli()
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("0. Bench (2 sets) 545.36 kg"))
        .stdout(predicate::str::contains("total: 545.36 kg"));
}

#[test]
fn test_replay_drag_reorders() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "A"}"#,
            r#"{"op": "add_exercise", "name": "B"}"#,
            r#"{"op": "add_exercise", "name": "C"}"#,
            r#"{"op": "drag", "from": 0, "to": 2}"#,
        ],
    );

    let output = ws.cli().arg("replay").arg(&script).output().unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    let after = stdout.split("[4] drag").nth(1).expect("drag step printed");
    let b = after.find("0. B").expect("B first");
    let c = after.find("1. C").expect("C second");
    let a = after.find("2. A").expect("A last");
    assert!(b < c && c < a);
}

#[test]
fn test_replay_delete_exercise_is_confirmed() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "Curl"}"#,
            r#"{"op": "add_exercise", "name": "Row"}"#,
            r#"{"op": "delete_exercise", "exercise": 0}"#,
        ],
    );

    let output = ws.cli().arg("replay").arg(&script).output().unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Delete 'Curl' and all of its sets? (confirmed)"));
    let after = stdout.split("[3] delete_exercise").nth(1).unwrap();
    assert!(after.contains("0. Row"));
    assert!(!after.contains("Curl"));
}

#[test]
fn test_replay_save_reports_prs() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "Squat"}"#,
            r#"{"op": "update_set", "exercise": 0, "set": 1, "weight": 140, "reps": 3}"#,
            r#"{"op": "add_set", "exercise": 0}"#,
            r#"{"op": "save"}"#,
        ],
    );

    ws.cli()
        .arg("replay")
        .arg(&script)
        .arg("--date")
        .arg("2024-03-01")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 2 sets"))
        .stdout(predicate::str::contains("New PR: Squat"));
}

#[test]
fn test_replay_empty_save_fails() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "Squat"}"#,
            r#"{"op": "save"}"#,
        ],
    );

    ws.cli()
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to save"));
}

#[test]
fn test_replay_shows_last_performance_from_fixture() {
    let ws = Workspace::new();
    let fixture = ws.write(
        "fixture.json",
        &[r#"{"ann@example.com": {"workouts": [
            {"date": "2024-02-20T10:00:00Z", "motion": "Deadlift", "set": 1, "weight": 180,
             "unit": "kg", "reps": 5, "weightInKg": 180, "note": ""}
        ]}}"#],
    );
    let script = ws.write("script.jsonl", &[r#"{"op": "add_exercise", "name": "Deadlift"}"#]);

    ws.cli()
        .arg("replay")
        .arg(&script)
        .arg("--fixture")
        .arg(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("[last 180.00 kg x 5]"));
}

#[test]
fn test_replay_rest_countdown() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "rest", "seconds": 90}"#,
            r#"{"op": "extend_rest"}"#,
            r#"{"op": "tick", "count": 5}"#,
        ],
    );

    ws.cli()
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("rest: 01:45"))
        .stdout(predicate::str::contains("rest: 01:40"));
}

#[test]
fn test_replay_rejects_bad_line() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            r#"{"op": "add_exercise", "name": "Squat"}"#,
            r#"{"op": "lift_harder"}"#,
        ],
    );

    ws.cli()
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("script.jsonl:2"));
}

#[test]
fn test_payload_skips_blank_sets() {
    let ws = Workspace::new();
    let script = ws.write(
        "script.jsonl",
        &[
            "# warm-up not logged",
            r#"{"op": "add_exercise", "name": "Press"}"#,
            r#"{"op": "update_set", "exercise": 0, "set": 1, "weight": 100, "unit": "lb", "reps": 8}"#,
            r#"{"op": "add_set", "exercise": 0}"#,
            r#"{"op": "update_set", "exercise": 0, "set": 2, "weight": 0}"#,
            r#"{"op": "set_note", "exercise": 0, "note": "strict"}"#,
            r#"{"op": "save"}"#,
        ],
    );

    let output = ws
        .cli()
        .arg("payload")
        .arg(&script)
        .arg("--date")
        .arg("2024-03-01")
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["motion"], "Press");
    assert_eq!(records[0]["unit"], "lb");
    assert_eq!(records[0]["note"], "strict");
    let kg = records[0]["weightInKg"].as_f64().unwrap();
    assert!((kg - 45.359237).abs() < 1e-9);
}

#[test]
fn test_rest_command_finishes() {
    let ws = Workspace::new();
    ws.cli()
        .arg("rest")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rest over"));
}

#[test]
fn test_rest_zero_is_immediate() {
    let ws = Workspace::new();
    ws.cli()
        .arg("rest")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rest over"));
}
