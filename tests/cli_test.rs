//! CLI integration tests for linkage-checker.
//!
//! These tests pin the exit codes and the JSON output shape used by automation.

mod common;

use common::{Repo, dep, jar};
use linkage_checker::classfile::{AccessFlags, ClassBuilder};
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_linkage-checker"))
        .args(args)
        .output()
        .expect("Failed to execute linkage-checker CLI")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// app.jar calls `b.Bar.run()`; lib.jar has `b.Bar` with or without it.
fn app_and_lib(dir: &Path, lib_has_method: bool) -> (String, String) {
    let app = jar(
        dir,
        "app.jar",
        vec![("a.App", ClassBuilder::new("a.App").invokes("b.Bar", "run", "()V"))],
    );
    let bar = if lib_has_method {
        ClassBuilder::new("b.Bar").method(AccessFlags::PUBLIC | AccessFlags::STATIC, "run", "()V")
    } else {
        ClassBuilder::new("b.Bar")
    };
    let lib = jar(dir, "lib.jar", vec![("b.Bar", bar)]);
    (
        app.to_string_lossy().into_owned(),
        lib.to_string_lossy().into_owned(),
    )
}

#[test]
fn test_help_command() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Help command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("check"), "Should mention check command");
    assert!(stdout.contains("pairs"), "Should mention pairs command");
}

#[test]
fn test_clean_classpath_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path(), true);

    let output = run_cli(&["check", "--jars", &format!("{},{}", app, lib)]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checked 2 classpath entries"), "{}", stdout);
    assert!(stdout.contains("No linkage problems found."), "{}", stdout);
}

#[test]
fn test_linkage_problems_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path(), false);

    let output = run_cli(&["check", "--jars", &format!("{},{}", app, lib)]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("b.Bar's method run() is not found;"),
        "Should describe the missing method: {}",
        stdout
    );
    assert!(stdout.contains("a.App"), "Should name the source class: {}", stdout);
}

#[test]
fn test_json_report_shape() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path(), false);

    let output = run_cli(&["check", "--json", "--jars", &format!("{},{}", app, lib)]);
    assert_eq!(output.status.code(), Some(1));

    let json = stdout_json(&output);
    assert_eq!(json["type"], "Check");
    assert_eq!(json["classpath_size"], 2);
    assert_eq!(json["report"]["problem_count"], 1);
    let group = &json["report"]["groups"][0];
    assert_eq!(group["kind"], "SymbolNotFound");
    assert_eq!(group["symbol"], "b.Bar's method run()");
    assert_eq!(group["references"][0]["class_name"], "a.App");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("\"linkage_problems\""),
        "Should report the failure code on stderr: {}",
        stderr
    );
}

#[test]
fn test_unresolvable_roots_exit_two() {
    let repo = Repo::new();
    let output = run_cli(&[
        "check",
        "--json",
        "-r",
        &repo.path().to_string_lossy(),
        "--artifacts",
        "g:gone:1",
    ]);
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    let error_line = stderr
        .find('{')
        .map(|start| &stderr[start..])
        .expect("JSON error on stderr");
    let json: Value = serde_json::from_str(error_line).expect("error should be JSON");
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "empty_classpath");
}

#[test]
fn test_invalid_coordinate_exits_two() {
    let output = run_cli(&["check", "--artifacts", "not-a-coordinate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_input_flags_are_exclusive() {
    let output = run_cli(&["check", "--artifacts", "g:a:1", "--jars", "a.jar"]);
    assert!(!output.status.success());
    assert_ne!(output.status.code(), Some(0));
}

#[test]
fn test_written_exclusion_file_suppresses_problems() {
    let dir = tempfile::tempdir().unwrap();
    let (app, lib) = app_and_lib(dir.path(), false);
    let jars = format!("{},{}", app, lib);
    let baseline = dir.path().join("exclusions.xml");
    let baseline = baseline.to_string_lossy();

    let output = run_cli(&["check", "--jars", &jars, "--write-exclusion-file", &baseline]);
    assert_eq!(output.status.code(), Some(1));
    let written = std::fs::read_to_string(baseline.as_ref()).unwrap();
    assert!(written.contains("<LinkageCheckerFilter"), "{}", written);

    let output = run_cli(&["check", "--jars", &jars, "--exclusion-file", &baseline]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stdout)
    );
}

#[test]
fn test_check_artifacts_from_local_repository() {
    let repo = Repo::new();
    repo.artifact("g:lib:1", "", vec![("b.Bar", ClassBuilder::new("b.Bar"))]);
    repo.artifact(
        "g:app:1",
        &dep("g:lib:1", ""),
        vec![("a.App", ClassBuilder::new("a.App").invokes("b.Bar", "run", "()V"))],
    );

    let output = run_cli(&[
        "check",
        "-r",
        &repo.path().to_string_lossy(),
        "--artifacts",
        "g:app:1",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(g:lib:1) b.Bar's method run() is not found;"), "{}", stdout);
    assert!(stdout.contains("Cause:"), "Artifact input should diagnose causes: {}", stdout);
    assert!(
        stdout.contains("Problematic artifacts in the dependency tree:"),
        "{}",
        stdout
    );
}

#[test]
fn test_pairs_command() {
    let repo = Repo::new();
    repo.artifact(
        "g:lib:2",
        "",
        vec![(
            "b.Bar",
            ClassBuilder::new("b.Bar").method(
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                "run",
                "()V",
            ),
        )],
    );
    repo.artifact("g:lib:1", "", vec![("b.Bar", ClassBuilder::new("b.Bar"))]);
    repo.artifact(
        "g:user:1",
        &dep("g:lib:2", ""),
        vec![("a.User", ClassBuilder::new("a.User").invokes("b.Bar", "run", "()V"))],
    );

    let output = run_cli(&[
        "pairs",
        "--json",
        "-r",
        &repo.path().to_string_lossy(),
        "--artifacts",
        "g:lib:1,g:user:1",
    ]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["type"], "Pairs");
    assert_eq!(json["results"][0]["first"], "g:lib:1");
    assert_eq!(json["results"][0]["second"], "g:user:1");
    assert_eq!(json["results"][0]["problem_count"], 1);
}

#[test]
fn test_config_file_enables_reachability() {
    let dir = tempfile::tempdir().unwrap();
    let app = jar(dir.path(), "app.jar", vec![("a.App", ClassBuilder::new("a.App"))]);
    let lib = jar(
        dir.path(),
        "lib.jar",
        vec![("b.Dead", ClassBuilder::new("b.Dead").invokes("c.Gone", "run", "()V"))],
    );
    let jars = format!("{},{}", app.display(), lib.display());

    // Every jar is an entry point, so nothing is filtered without a narrower root.
    let config = dir.path().join("checker.json");
    std::fs::write(&config, r#"{ "report_only_reachable": true }"#).unwrap();
    let output = run_cli(&["check", "--config", &config.to_string_lossy(), "--jars", &jars]);
    assert_eq!(output.status.code(), Some(1));

    std::fs::write(&config, r#"{ "report_only_reachable": "yes" }"#).unwrap();
    let output = run_cli(&["check", "--config", &config.to_string_lossy(), "--jars", &jars]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse config"));
}
