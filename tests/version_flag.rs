use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn prints_version() {
    let exe = env!("CARGO_BIN_EXE_newsdeck");
    let output = Command::new(exe)
        .arg("--version")
        .output()
        .expect("run newsdeck --version");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help() {
    Command::new(env!("CARGO_BIN_EXE_newsdeck"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Newsdeck"))
        .stdout(predicate::str::contains("--digest"))
        .stdout(predicate::str::contains("--view"));
}

#[test]
fn rejects_unknown_arguments() {
    Command::new(env!("CARGO_BIN_EXE_newsdeck"))
        .arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn view_flag_requires_a_value() {
    Command::new(env!("CARGO_BIN_EXE_newsdeck"))
        .arg("--view")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--view requires"));
}
