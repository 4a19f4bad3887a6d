//! Integration tests for `avbbs state`

#![cfg(unix)]

mod common;

use common::{path_str, stderr, stdout, TestProject};
use serde_json::json;

#[test]
fn test_state_lists_ledgers() {
    let project = TestProject::new();
    project.write_package(
        "pkg",
        &[],
        json!({ "configure": ["true"], "build": ["true"] }),
    );
    project.write_package("idle", &[], json!({}));
    assert!(project.build(&[]).status.success());

    let root = project.root();
    let dest = project.dest();
    let output = project.run(&["state", path_str(&root), "--dest", path_str(&dest)]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("pkg: configure, build"), "stdout: {out}");
    assert!(out.contains("idle: (nothing built)"), "stdout: {out}");
}

#[test]
fn test_clear_forces_rebuild_of_one_package() {
    let project = TestProject::new();
    project.write_package("app", &["base"], json!({ "build": [project.record("app")] }));
    project.write_package("base", &[], json!({ "build": [project.record("base")] }));
    assert!(project.build(&[]).status.success());
    project.reset_log();

    let root = project.root();
    let dest = project.dest();
    let output = project.run(&[
        "state",
        path_str(&root),
        "--dest",
        path_str(&dest),
        "--clear",
        "app",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(project.ledger("app").is_empty());
    assert_eq!(project.ledger("base"), vec!["build"]);

    assert!(project.build(&[]).status.success());
    assert_eq!(project.log_lines(), vec!["app"]);
}

#[test]
fn test_clear_unknown_package_fails() {
    let project = TestProject::new();
    project.write_package("base", &[], json!({}));

    let root = project.root();
    let dest = project.dest();
    let output = project.run(&[
        "state",
        path_str(&root),
        "--dest",
        path_str(&dest),
        "--clear",
        "nope",
    ]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Package 'nope' not found"));
}

#[test]
fn test_dest_from_environment_variable() {
    let project = TestProject::new();
    project.write_package("pkg", &[], json!({ "build": ["true"] }));
    assert!(project.build(&[]).status.success());

    let root = project.root();
    let output = project
        .command(&["state", path_str(&root)])
        .env("AVBBS_DEST", project.dest())
        .output()
        .expect("Failed to execute avbbs");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("pkg: build"));
}
