//! CLI integration tests: run the dynmock binary to cover main.rs branches.
//! Uses CARGO_BIN_EXE_dynmock when set (e.g. by `cargo test`).

use std::process::Command;

fn bin() -> Option<std::path::PathBuf> {
    std::env::var_os("CARGO_BIN_EXE_dynmock").map(std::path::PathBuf::from)
}

#[test]
fn test_cli_help_succeeds() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin).arg("--help").output().expect("run --help");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("dynmock"));
    assert!(stdout.contains("run") && stdout.contains("list"));
}

#[test]
fn test_cli_list_prints_demo_cases() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin).arg("list").output().expect("run list");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("mock_callable_for_call (sync)"), "{stdout}");
    assert!(stdout.contains("mock_async_callable (async)"), "{stdout}");
}

#[test]
fn test_cli_run_json_report() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin)
        .args(["run", "--json", "--filter", "^strict_"])
        .output()
        .expect("run --json");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json report");
    assert_eq!(report["failed"], 0);
    let names: Vec<&str> = report["outcomes"]
        .as_array()
        .expect("outcomes")
        .iter()
        .filter_map(|o| o["name"].as_str())
        .collect();
    assert_eq!(names, vec!["strict_double_calculator"]);
}

#[test]
fn test_cli_run_human_summary() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin)
        .args(["run", "--exclude", "async"])
        .output()
        .expect("run");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("0 failed"), "{stdout}");
    assert!(!stdout.contains("mock_async_callable"));
}

#[test]
fn test_cli_invalid_filter_fails() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin)
        .args(["run", "--filter", "("])
        .output()
        .expect("run with bad filter");
    assert!(!out.status.success(), "expected failure for an invalid regex");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Invalid filter regex"), "{stderr}");
}

#[test]
fn test_cli_missing_config_fails() {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return;
    };
    let out = Command::new(bin)
        .args(["run", "--config", "nonexistent_dynmock_config_12345.json"])
        .output()
        .expect("run with missing config");
    assert!(!out.status.success());
}
