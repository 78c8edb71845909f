//! CLI help/usage specs for `opsctl`. These exercise argument parsing only
//! and never require a running daemon.

use assert_cmd::Command;

fn run(args: &[&str]) -> (bool, String, String) {
    let output = Command::cargo_bin("opsctl").expect("opsctl binary built").args(args).output().expect("spawn opsctl");
    (output.status.success(), String::from_utf8_lossy(&output.stdout).into_owned(), String::from_utf8_lossy(&output.stderr).into_owned())
}

#[test]
fn no_args_shows_usage_and_exits_nonzero() {
    let (success, _, stderr) = run(&[]);
    assert!(!success);
    assert!(stderr.contains("Usage:"), "stderr was: {stderr}");
}

#[test]
fn help_shows_usage() {
    let (success, stdout, _) = run(&["--help"]);
    assert!(success);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn operations_help_shows_subcommands() {
    let (success, stdout, _) = run(&["operations", "--help"]);
    assert!(success);
    assert!(stdout.contains("create"));
    assert!(stdout.contains("resume"));
}

#[test]
fn workers_help_shows_subcommands() {
    let (success, stdout, _) = run(&["workers", "--help"]);
    assert!(success);
    assert!(stdout.contains("register"));
    assert!(stdout.contains("list"));
}

#[test]
fn operations_create_rejects_unknown_operation_type() {
    let (success, _, stderr) = run(&["operations", "create", "quantum_leap"]);
    assert!(!success);
    assert!(stderr.contains("unknown operation type"), "stderr was: {stderr}");
}

#[test]
fn version_shows_version() {
    let (success, stdout, _) = run(&["--version"]);
    assert!(success);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
