//! End-to-end CLI tests.

use assert_cmd::Command;
use predicates::prelude::*;

const PAYSTUB: &str = "277 Logistics\n\
Pay Period: 12/28/2024\n\
Plate#: VW9327\n\
B-1 Smith Start of Load 12/23/2024 $700.00\n\
B-2 Smith Start of Load 12/24/2024 $650.00\n\
Gross Pay $1,350.00\n\
Net Pay $1,000.00\n";

fn haulsheet() -> Command {
    Command::cargo_bin("haulsheet").expect("binary built")
}

#[test]
fn process_missing_file_fails() {
    haulsheet()
        .args(["process", "does-not-exist.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn process_paystub_outputs_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paystub.txt");
    std::fs::write(&input, PAYSTUB).unwrap();

    haulsheet()
        .args(["process", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"license_plate\":\"VW9327\""))
        .stdout(predicate::str::contains("277 Logistics"));
}

#[test]
fn process_empty_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    std::fs::write(&input, "\n").unwrap();

    haulsheet()
        .args(["process", input.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn batch_writes_summary_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("paystub.txt");
    std::fs::write(&input, PAYSTUB).unwrap();
    let out_dir = dir.path().join("out");

    haulsheet()
        .args([
            "batch",
            input.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--summary",
        ])
        .assert()
        .success();

    let summary = std::fs::read_to_string(out_dir.join("summary.csv")).unwrap();
    assert!(summary.starts_with("source_file,"));
    assert!(summary.contains("VW9327"));
}

#[test]
fn config_path_prints_location() {
    haulsheet()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"));
}
