//! CLI surface smoke tests (no browser required)

use assert_cmd::Command;

#[test]
fn help_prints_usage() {
    let output = Command::cargo_bin("webpilot")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Autonomous browser test execution"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("resume"));
}

#[test]
fn show_unknown_run_exits_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("webpilot.toml");
    std::fs::write(
        &config,
        format!("state_dir = \"{}\"\n", tmp.path().join("state").display()),
    )
    .unwrap();

    let output = Command::cargo_bin("webpilot")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "show", "nope"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
