//! CLI integration tests for the `qti` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to the fixtures under `crates/cli/tests/fixtures` resolve.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CHOICE: &str = "crates/cli/tests/fixtures/choice.json";
const MAPPED: &str = "crates/cli/tests/fixtures/mapped.json";
const UNRESOLVED: &str = "crates/cli/tests/fixtures/unresolved.json";
const CORRECT: &str = "crates/cli/tests/fixtures/correct.json";
const WRONG_THEN_RIGHT: &str = "crates/cli/tests/fixtures/wrong_then_right.json";
const TWO_ATTEMPTS: &str = "crates/cli/tests/fixtures/two_attempts.toml";

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `qti` binary, rooted at workspace.
fn qti() -> Command {
    let mut cmd = cargo_bin_cmd!("qti");
    cmd.current_dir(workspace_root());
    cmd
}

fn write_temp(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write temp file");
    path
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = qti()
        .args(["--output", "json", "run"])
        .args(args)
        .output()
        .expect("run qti");
    assert!(
        output.status.success(),
        "qti run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    qti()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("QTI item runtime"));
}

#[test]
fn version_exits_0() {
    qti()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qti"));
}

#[test]
fn run_help_lists_options() {
    qti()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--responses"))
        .stdout(predicate::str::contains("--delivery"));
}

// ──────────────────────────────────────────────
// 2. Check subcommand
// ──────────────────────────────────────────────

#[test]
fn check_valid_item_exits_0() {
    qti()
        .args(["check", CHOICE])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: item 'choice'"));
}

#[test]
fn check_json_output() {
    let output = qti()
        .args(["--output", "json", "check", MAPPED])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["item"], "mapped");
    assert_eq!(json["valid"], true);
}

#[test]
fn check_unresolved_reference_exits_1() {
    qti()
        .args(["check", UNRESOLVED])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("MISSING"));
}

#[test]
fn check_missing_file_exits_1() {
    qti()
        .args(["check", "does/not/exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn check_unknown_operator_reports_path() {
    let dir = TempDir::new().unwrap();
    let item = write_temp(
        &dir,
        "bad.json",
        r#"{
            "identifier": "bad",
            "declarations": [
                {"kind": "outcome", "identifier": "SCORE", "cardinality": "single", "baseType": "float"}
            ],
            "responseProcessing": [
                {"rule": "setOutcomeValue", "identifier": "SCORE", "expression": {"op": "frobnicate"}}
            ]
        }"#,
    );
    qti()
        .args(["check", item.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn json_errors_are_objects() {
    let output = qti()
        .args(["--output", "json", "check", "does/not/exist.json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[test]
fn quiet_suppresses_output() {
    qti()
        .args(["--quiet", "check", CHOICE])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 3. Run subcommand
// ──────────────────────────────────────────────

#[test]
fn run_correct_answer_scores_and_closes() {
    qti()
        .args(["run", CHOICE, "--responses", CORRECT])
        .assert()
        .success()
        .stdout(predicate::str::contains("submission 1: completed"))
        .stdout(predicate::str::contains("SCORE = 1"))
        .stdout(predicate::str::contains("session closed"));
}

#[test]
fn run_json_reports_session_values() {
    let json = run_json(&[CHOICE, "--responses", CORRECT]);
    assert_eq!(json["item"], "choice");
    assert_eq!(json["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(json["session"]["state"], "closed");
    assert_eq!(json["session"]["completedAttempts"], 1);
}

#[test]
fn default_delivery_ignores_second_submission() {
    let json = run_json(&[CHOICE, "--responses", WRONG_THEN_RIGHT]);
    assert_eq!(json["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(json["session"]["state"], "closed");
}

#[test]
fn delivery_file_allows_second_attempt() {
    let json = run_json(&[
        CHOICE,
        "--responses",
        WRONG_THEN_RIGHT,
        "--delivery",
        TWO_ATTEMPTS,
    ]);
    assert_eq!(json["attempts"].as_array().unwrap().len(), 2);
    assert_eq!(json["session"]["completedAttempts"], 2);
    assert_eq!(json["session"]["state"], "closed");
}

#[test]
fn max_attempts_flag_overrides_delivery_file() {
    let json = run_json(&[
        CHOICE,
        "--responses",
        WRONG_THEN_RIGHT,
        "--delivery",
        TWO_ATTEMPTS,
        "--max-attempts",
        "0",
    ]);
    assert_eq!(json["attempts"].as_array().unwrap().len(), 2);
    assert_eq!(json["session"]["state"], "interacting");
}

#[test]
fn run_mapped_multiple_response() {
    let dir = TempDir::new().unwrap();
    let responses = write_temp(&dir, "r.json", r#"[{"RESPONSE": ["H", "O", "Cl"]}]"#);
    qti()
        .args(["run", MAPPED, "--responses", responses.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("SCORE = 1"));
}

#[test]
fn run_reports_bad_identifiers_without_failing() {
    let dir = TempDir::new().unwrap();
    let responses = write_temp(&dir, "r.json", r#"[{"NOPE": "ChoiceA"}]"#);
    qti()
        .args(["run", CHOICE, "--responses", responses.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("bad responses: NOPE"))
        .stdout(predicate::str::contains("session interacting"));
}

#[test]
fn run_reports_invalid_responses() {
    let dir = TempDir::new().unwrap();
    // Blank binds NULL, which fails minValues = 1.
    let responses = write_temp(&dir, "r.json", r#"[{"RESPONSE": ""}]"#);
    qti()
        .args(["run", CHOICE, "--responses", responses.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("invalid responses: RESPONSE"));
}

#[test]
fn run_missing_responses_file_exits_1() {
    qti()
        .args(["run", CHOICE, "--responses", "nope.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("responses file not found"));
}

#[test]
fn run_malformed_submissions_exits_1() {
    let dir = TempDir::new().unwrap();
    let responses = write_temp(&dir, "r.json", r#"{"RESPONSE": "ChoiceA"}"#);
    qti()
        .args(["run", CHOICE, "--responses", responses.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid submissions"));
}

#[test]
fn run_unknown_delivery_key_exits_1() {
    let dir = TempDir::new().unwrap();
    let delivery = write_temp(&dir, "d.toml", "max_attempts = 2\nallow_teleport = true\n");
    qti()
        .args([
            "run",
            CHOICE,
            "--responses",
            CORRECT,
            "--delivery",
            delivery.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid delivery settings"));
}

#[test]
fn elapsed_time_accumulates_into_duration() {
    let json = run_json(&[
        CHOICE,
        "--responses",
        WRONG_THEN_RIGHT,
        "--max-attempts",
        "2",
    ]);
    let duration = &json["session"]["values"]["duration"];
    assert!(
        duration.to_string().contains("12.5"),
        "duration was {}",
        duration
    );
}

#[test]
fn run_unrepresentable_elapsed_time_exits_1() {
    let dir = TempDir::new().unwrap();
    let responses = write_temp(
        &dir,
        "r.json",
        r#"[{"responses": {"RESPONSE": "ChoiceA"}, "elapsedSeconds": 1e20}]"#,
    );
    qti()
        .args(["run", CHOICE, "--responses", responses.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("submission 1: invalid elapsedSeconds"));
}
