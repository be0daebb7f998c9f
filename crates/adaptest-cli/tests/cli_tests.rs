//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BANK: &str = "../../banks/nursing-core.toml";

fn adaptest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("adaptest").unwrap()
}

fn simulate_into(dir: &Path, extra: &[&str]) {
    adaptest()
        .arg("simulate")
        .arg("--bank")
        .arg(BANK)
        .arg("--thetas=-1,1")
        .arg("--replications")
        .arg("2")
        .arg("--session-type")
        .arg("express")
        .arg("--output")
        .arg(dir)
        .args(extra)
        .assert()
        .success();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn validate_valid_bank() {
    adaptest()
        .arg("validate")
        .arg("--bank")
        .arg(BANK)
        .assert()
        .success()
        .stdout(predicate::str::contains("40 items, 4 domains, 2 critical"))
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn validate_directory() {
    adaptest()
        .arg("validate")
        .arg("--bank")
        .arg("../../banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nursing Core Diagnostic"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[bank]
id = "broken"
name = "Broken"

[[domains]]
code = "A"
weight = 80

[[items]]
id = "q1"
domain = "A"
a = 0.0
b = 0.0
correct = 0
"#,
    )
    .unwrap();

    adaptest()
        .arg("validate")
        .arg("--bank")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[q1] WARNING"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    adaptest()
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created adaptest.toml"))
        .stdout(predicate::str::contains("Created banks/example.toml"));

    assert!(dir.path().join("adaptest.toml").exists());
    assert!(dir.path().join("banks/example.toml").exists());

    adaptest()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--bank")
        .arg("banks/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn simulate_writes_reports_and_summary() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .arg("simulate")
        .arg("--bank")
        .arg(BANK)
        .arg("--thetas=-1,1")
        .arg("--replications")
        .arg("2")
        .arg("--session-type")
        .arg("express")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("True θ"))
        .stdout(predicate::str::contains("RMSE"));

    let summary = read_json(&dir.path().join("summary.json"));
    assert_eq!(summary["bank"], "nursing-core");
    assert_eq!(summary["session_type"], "express");
    assert_eq!(summary["recovery"].as_array().unwrap().len(), 2);

    let outcomes = summary["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 4);
    for o in outcomes {
        let answered = o["questions_answered"].as_u64().unwrap();
        assert!((10..=25).contains(&answered));
    }

    let reports = std::fs::read_dir(dir.path().join("reports")).unwrap().count();
    assert_eq!(reports, 4);
    assert!(dir.path().join("reports/sim-0-0.json").exists());
}

#[test]
fn simulate_is_deterministic_for_a_seed_at_any_parallelism() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    simulate_into(first.path(), &["--seed", "9", "--parallelism", "1"]);
    simulate_into(second.path(), &["--seed", "9", "--parallelism", "4"]);

    let a = read_json(&first.path().join("summary.json"));
    let b = read_json(&second.path().join("summary.json"));
    assert_eq!(a["outcomes"], b["outcomes"]);
}

#[test]
fn simulate_markdown_reports() {
    let dir = TempDir::new().unwrap();
    simulate_into(dir.path(), &["--format", "markdown"]);
    let md = std::fs::read_to_string(dir.path().join("reports/sim-1-1.md")).unwrap();
    assert!(md.contains("# Diagnostic report"));
    assert!(md.contains("## Domains"));
}

#[test]
fn simulate_domain_scoped() {
    let dir = TempDir::new().unwrap();
    adaptest()
        .arg("simulate")
        .arg("--bank")
        .arg(BANK)
        .arg("--thetas=0")
        .arg("--replications")
        .arg("1")
        .arg("--session-type")
        .arg("domain:SAFE,CARE")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success();

    let report = read_json(&dir.path().join("reports/sim-0-0.json"));
    let domains: Vec<&str> = report["domain_results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["code"].as_str().unwrap())
        .collect();
    assert_eq!(domains, vec!["SAFE", "CARE"]);
}

#[test]
fn simulate_honours_config_presets() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("adaptest.toml");
    std::fs::write(
        &config,
        "[sessions.express]\nmin_questions = 3\nmax_questions = 6\ntarget_se = 0.01\n",
    )
    .unwrap();

    let out = dir.path().join("out");
    simulate_into(&out, &["--config", config.to_str().unwrap()]);

    let summary = read_json(&out.join("summary.json"));
    for o in summary["outcomes"].as_array().unwrap() {
        assert_eq!(o["questions_answered"], 6);
        assert_eq!(o["stop_reason"], "max_questions");
    }
}

#[test]
fn simulate_rejects_bad_session_type() {
    adaptest()
        .arg("simulate")
        .arg("--bank")
        .arg(BANK)
        .arg("--session-type")
        .arg("marathon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown session type"));
}

#[test]
fn report_renders_markdown_and_json() {
    let dir = TempDir::new().unwrap();
    simulate_into(dir.path(), &[]);
    let input = dir.path().join("reports/sim-0-0.json");

    adaptest()
        .arg("report")
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Diagnostic report"))
        .stdout(predicate::str::contains("sim-0-0"));

    let out = dir.path().join("out/report.md");
    adaptest()
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&out)
        .unwrap()
        .contains("## Readiness"));

    let output = adaptest()
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["user_id"], "sim-0-0");
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    let baseline_path = dir.path().join("baseline.json");
    let current_path = dir.path().join("current.json");
    std::fs::write(&baseline_path, make_test_report(-0.4, 0.3, 0.5)).unwrap();
    std::fs::write(&current_path, make_test_report(0.6, 0.9, 0.5)).unwrap();

    adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline_path)
        .arg("--current")
        .arg(&current_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("θ +1.00"))
        .stdout(predicate::str::contains("1 gains, 0 declines, 1 unchanged"));

    adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg(&current_path)
        .arg("--current")
        .arg(&baseline_path)
        .arg("--fail-on-decline")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Declines:"));
}

#[test]
fn compare_json_format() {
    let dir = TempDir::new().unwrap();
    let baseline_path = dir.path().join("baseline.json");
    let current_path = dir.path().join("current.json");
    std::fs::write(&baseline_path, make_test_report(0.0, 0.5, 0.5)).unwrap();
    std::fs::write(&current_path, make_test_report(0.0, 0.5, 0.5)).unwrap();

    let output = adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline_path)
        .arg("--current")
        .arg(&current_path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["unchanged"], 2);
    assert!(json["declines"].as_array().unwrap().is_empty());
}

#[test]
fn compare_nonexistent_report() {
    adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}

#[test]
fn help_output() {
    adaptest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adaptive diagnostic testing engine"));
}

#[test]
fn version_output() {
    adaptest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("adaptest"));
}

/// Create a minimal valid JSON report with two domains.
fn make_test_report(theta: f64, pharm_accuracy: f64, safe_accuracy: f64) -> String {
    format!(
        r#"{{
    "session_id": "00000000-0000-0000-0000-000000000000",
    "user_id": "learner",
    "session_type": {{ "kind": "full" }},
    "stop_reason": "precision_reached",
    "questions_answered": 20,
    "correct": 12,
    "accuracy": 0.6,
    "final_score": {score},
    "ability": {{ "theta": {theta}, "se": 0.3 }},
    "domain_results": [
        {{
            "code": "PHARM", "name": "Pharmacology", "weight": 60.0, "is_critical": true,
            "answered": 10, "correct": 5, "accuracy": {pharm_accuracy},
            "sub_ability": 0.0, "tag": "practice_recommended"
        }},
        {{
            "code": "SAFE", "name": "Safety", "weight": 40.0, "is_critical": false,
            "answered": 10, "correct": 5, "accuracy": {safe_accuracy},
            "sub_ability": 0.0, "tag": "practice_recommended"
        }}
    ],
    "readiness": {{
        "level": "medium", "score": 55.0, "message": "", "critical_gaps": []
    }},
    "recommendations": [],
    "avg_response_time_ms": 1500,
    "started_at": "2026-01-01T00:00:00Z",
    "generated_at": "2026-01-01T00:10:00Z"
}}"#,
        score = (theta + 3.0) / 6.0 * 100.0
    )
}
