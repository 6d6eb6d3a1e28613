//! # `kbc` Binary Tests
//!
//! Runs the compiled binary in a scratch directory and checks that bad
//! arguments and missing inputs fail before any service is contacted.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::{tempdir, TempDir};

fn kbc(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kbc").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("OPENAI_API_KEY")
        .env_remove("BRAVE_SUBSCRIPTION_TOKEN");
    cmd
}

fn evaluate_args<'a>(method: &'a str, metric: &'a str) -> Vec<&'a str> {
    vec![
        "evaluate",
        "--triples-dir",
        "triples",
        "--subjects",
        "subjects.json",
        "--judge-model",
        "gpt-4o-mini",
        "--method",
        method,
        "--metric",
        metric,
    ]
}

#[test]
fn test_unknown_metric_is_rejected() {
    let dir = tempdir().unwrap();

    kbc(&dir)
        .args(evaluate_args("wikidata", "f1"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'f1'"));
}

#[test]
fn test_missing_triples_dir_fails_before_any_call() {
    let dir = tempdir().unwrap();

    kbc(&dir)
        .args(evaluate_args("wikidata", "precision"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Triples directory 'triples' does not exist"));
}

#[test]
fn test_web_recall_is_rejected() {
    // --- 1. Arrange ---
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("triples")).unwrap();

    // --- 2. Act & Assert ---
    kbc(&dir)
        .args(evaluate_args("web", "recall"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("precision"));
    assert!(!dir.path().join("results").exists());
}

#[test]
fn test_status_on_an_empty_work_dir() {
    let dir = tempdir().unwrap();

    kbc(&dir)
        .args(["elicit", "--model", "gpt-4o-mini", "--mode", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 in progress, 0 completed."));
}

#[test]
fn test_status_lists_job_records() {
    // --- 1. Arrange ---
    let dir = tempdir().unwrap();
    let progress = dir.path().join("work").join("progress_dir");
    fs::create_dir_all(&progress).unwrap();
    fs::write(
        progress.join("in_progress_3.json"),
        r#"{"batch_id": "batch_abc", "status": "in_progress", "source_index": 3, "source_template_name": "writers.jinja"}"#,
    )
    .unwrap();

    // --- 2. Act & Assert ---
    kbc(&dir)
        .args([
            "elicit",
            "--model",
            "gpt-4o-mini",
            "--mode",
            "status",
            "--work-dir",
            "work",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 in progress, 0 completed."))
        .stdout(predicate::str::contains("#3 batch_abc 'writers.jinja'"));
}

#[test]
fn test_submit_without_templates_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("subjects.json"), r#"{"writers": ["Octavia Butler"]}"#).unwrap();

    kbc(&dir)
        .args([
            "elicit",
            "--model",
            "gpt-4o-mini",
            "--mode",
            "submit",
            "--subjects",
            "subjects.json",
            "--template-dir",
            "missing",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Template directory 'missing' does not exist"));
}

#[test]
fn test_verify_without_api_key_fails() {
    let dir = tempdir().unwrap();

    kbc(&dir)
        .args(["elicit", "--model", "gpt-4o-mini", "--mode", "verify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key is missing"));
}
