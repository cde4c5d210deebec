//! CLI integration tests

use std::process::Command;

#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "meter-bridge", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("--port"), "Should show port option");
    assert!(stdout.contains("--url"), "Should show url option");
    assert!(stdout.contains("--retry-secs"), "Should show retry option");
    assert!(stdout.contains("--timeout-secs"), "Should show timeout option");
}

#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "meter-bridge", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("meter-bridge"), "Should show binary name");
}

#[test]
fn test_port_is_required() {
    let output = Command::new("cargo")
        .args(["run", "-p", "meter-bridge", "--"])
        .env_remove("METER_PORT")
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing --port should fail");
    assert!(stderr.contains("--port"), "Should mention the missing option");
}

#[test]
fn test_stdin_source_exits_at_end_of_input() {
    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "meter-bridge",
            "--",
            "--port",
            "-",
            "--url",
            "http://127.0.0.1:9/predict",
            "--timeout-secs",
            "1",
        ])
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Bridge should exit cleanly when stdin ends");
}
