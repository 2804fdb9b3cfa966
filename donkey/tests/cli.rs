//! CLI tests for the `donkey` binary.
//!
//! Spawns the binary in scratch directories and checks exit codes and the
//! rendered output.

use std::process::{Command, Output};

use donkey::exit_codes;
use donkey::test_support::Workspace;

fn donkey(workspace: &Workspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_donkey"))
        .current_dir(workspace.path())
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("run donkey")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn help_describes_the_tool() {
    let workspace = Workspace::new().expect("workspace");
    let output = donkey(&workspace, &["--help"]);
    assert!(output.status.success());
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Like \"make\" but for the 21st century"));
    assert!(stdout.contains("--definition-file"));
}

#[test]
fn runs_the_requested_group() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition(".config:\n  interpreter: sh\nfoo:\n- echo foo\n")
        .expect("write definition");

    let output = donkey(&workspace, &["foo"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Running \"foo\"..."), "{stdout}");
    assert!(stdout.lines().any(|line| line.ends_with(" foo")), "{stdout}");
    assert!(stdout.contains("\"foo\" finished in"), "{stdout}");
    assert!(stdout.contains("return code: 0"), "{stdout}");
}

#[test]
fn runs_the_default_group_from_a_parent_directory() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition(".config:\n  interpreter: sh\n.default: foo\nfoo:\n- echo from-default\n")
        .expect("write definition");
    workspace
        .write_file("nested/dir/.keep", "")
        .expect("nested dir");

    let output = Command::new(env!("CARGO_BIN_EXE_donkey"))
        .current_dir(workspace.path().join("nested/dir"))
        .env_remove("RUST_LOG")
        .output()
        .expect("run donkey");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(text(&output.stdout).contains("from-default"));
}

#[test]
fn stale_default_still_runs_named_groups() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition(".config:\n  interpreter: sh\n.default: gone\nfoo:\n- echo named\n")
        .expect("write definition");

    let named = donkey(&workspace, &["foo"]);
    assert_eq!(named.status.code(), Some(exit_codes::OK));
    assert!(text(&named.stdout).contains("named"));

    let defaulted = donkey(&workspace, &[]);
    assert_eq!(defaulted.status.code(), Some(exit_codes::CONFIG));
    assert!(text(&defaulted.stderr).contains("Command \"gone\" not found"));
}

#[test]
fn missing_definition_file_is_a_config_error() {
    let workspace = Workspace::new().expect("workspace");
    let output = donkey(&workspace, &["foo"]);
    assert_eq!(output.status.code(), Some(exit_codes::CONFIG));
    assert!(text(&output.stderr).contains("Unable to find definition file"));
}

#[test]
fn failing_command_exits_with_its_code() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition(".config:\n  interpreter: sh\nfoo:\n- exit 7\n")
        .expect("write definition");

    let output = donkey(&workspace, &["foo"]);

    assert_eq!(output.status.code(), Some(7));
    assert!(text(&output.stderr).contains("commands failed, return codes: 7"));
}

#[test]
fn unknown_command_lists_options() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition("foo: [echo foo]\nbar: [echo bar]\n")
        .expect("write definition");

    let output = donkey(&workspace, &["nope"]);

    assert_eq!(output.status.code(), Some(exit_codes::CONFIG));
    let stderr = text(&output.stderr);
    assert!(stderr.contains("Command \"nope\" not found"), "{stderr}");
    assert!(stderr.contains("options: foo, bar"), "{stderr}");
}

#[test]
fn invalid_definition_is_a_config_error() {
    let workspace = Workspace::new().expect("workspace");
    workspace
        .write_definition("foo: 42\n")
        .expect("write definition");

    let output = donkey(&workspace, &["foo"]);

    assert_eq!(output.status.code(), Some(exit_codes::CONFIG));
    assert!(text(&output.stderr).contains("Invalid definition file"));
}

#[test]
fn check_validates_without_running() {
    let workspace = Workspace::new().expect("workspace");
    let marker = workspace.path().join("ran.txt");
    workspace
        .write_definition(&format!(
            ".config:\n  interpreter: sh\nfoo:\n- touch '{}'\n",
            marker.display()
        ))
        .expect("write definition");

    let output = donkey(&workspace, &["check", "foo"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!marker.exists());
}
