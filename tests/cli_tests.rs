//! Command-line behavior that does not depend on the HDF5 backend

use assert_cmd::Command;
use predicates::prelude::*;

fn fast5cram() -> Command {
    Command::cargo_bin("fast5cram").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    fast5cram()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("forward-convert"))
        .stdout(predicate::str::contains("reverse-convert"));
}

#[test]
fn test_forward_requires_input_and_output() {
    fast5cram()
        .args(["forward-convert", "-o", "out.cram"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--inputdir"));
}

#[test]
fn test_forward_missing_input_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.cram");

    fast5cram()
        .arg("forward-convert")
        .arg("-i")
        .arg(dir.path().join("no_such_dir"))
        .arg("-o")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));

    assert!(!output.exists());
}

#[test]
fn test_forward_missing_fastq_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.cram");

    fast5cram()
        .arg("forward-convert")
        .arg("-i")
        .arg(dir.path())
        .arg("-o")
        .arg(&output)
        .arg("-f")
        .arg(dir.path().join("no_fastq"))
        .assert()
        .failure();

    assert!(!output.exists());
}

#[test]
fn test_reverse_missing_archive_fails() {
    let dir = tempfile::tempdir().unwrap();

    fast5cram()
        .arg("reverse-convert")
        .arg("-i")
        .arg(dir.path().join("missing.cram"))
        .arg("-o")
        .arg(dir.path().join("restored"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_reverse_rejects_non_cram_input() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("bogus.cram");
    std::fs::write(&archive, "@HD\tVN:1.6\n").unwrap();

    fast5cram()
        .arg("--format")
        .arg("json")
        .arg("reverse-convert")
        .arg("-i")
        .arg(&archive)
        .arg("-o")
        .arg(dir.path().join("restored"))
        .assert()
        .failure();
}
