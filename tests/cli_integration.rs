//! Integration tests for the command-line interface
//!
//! Drives the built `in-place` binary against files in a temp directory.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_in-place"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

/// Helper to create a test directory with a file to edit
fn setup_test_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("notes.txt"),
        "hello world   \nhello again\t\nbye\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_help() {
    let dir = setup_test_dir();
    let output = run(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("replace"));
    assert!(stdout.contains("strip"));
}

#[test]
fn test_replace() {
    let dir = setup_test_dir();
    let output = run(dir.path(), &["replace", "notes.txt", "hello", "goodbye"]);

    assert!(output.status.success());
    let content = fs::read_to_string(dir.path().join("notes.txt")).unwrap();
    assert_eq!(content, "goodbye world   \ngoodbye again\t\nbye\n");
}

#[test]
fn test_replace_with_backup_ext() {
    let dir = setup_test_dir();
    let output = run(
        dir.path(),
        &["replace", "notes.txt", "bye", "ciao", "--backup-ext", ".bak"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Backup:"));
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt.bak")).unwrap(),
        "hello world   \nhello again\t\nbye\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "hello world   \nhello again\t\nciao\n"
    );
}

#[test]
fn test_strip_dry_run_with_diff() {
    let dir = setup_test_dir();
    let output = run(dir.path(), &["strip", "notes.txt", "--dry-run", "--diff"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry run"));
    assert!(stdout.contains("+hello world\n"));

    // Nothing changed on disk, nothing left behind
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "hello world   \nhello again\t\nbye\n"
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_strip() {
    let dir = setup_test_dir();
    let output = run(dir.path(), &["strip", "notes.txt"]);

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "hello world\nhello again\nbye\n"
    );
}

#[test]
fn test_conflicting_backup_flags_fail() {
    let dir = setup_test_dir();
    let output = run(
        dir.path(),
        &["strip", "notes.txt", "--backup", "old.txt", "--backup-ext", ".bak"],
    );

    assert!(!output.status.success());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["replace", "missing.txt", "a", "b"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to open missing.txt"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_invalid_mode_rejected() {
    let dir = setup_test_dir();
    let output = run(dir.path(), &["strip", "notes.txt", "--mode", "x"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid mode"));
}
