//! Integration tests for CLI execution using `assert_cmd`.
//!
//! These tests invoke the compiled binary against temporary source trees
//! and check exit status, console output and the files left behind.

use anyhow::{Context, Result, ensure};
use assert_cmd::Command;
use predicates::prelude::*;
use test_support::Project;

fn maat(project: &Project) -> Result<Command> {
    let mut cmd = Command::cargo_bin("maat").context("locate maat binary")?;
    cmd.current_dir(project.root())
        .env_remove("MAAT_FILE")
        .env_remove("MAAT_JOBS")
        .env_remove("MAAT_KEEP_GOING");
    Ok(cmd)
}

#[test]
fn builds_default_goal() -> Result<()> {
    let project = Project::new();
    project
        .script("greeting.txt: name.txt\n\twrite($@, hello)\n\techo(built $@)\n")
        .write("name.txt", "world");
    maat(&project)?
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/1] greeting.txt"))
        .stdout(predicate::str::contains("built greeting.txt"));
    ensure!(project.read("greeting.txt") == "hello", "target written");
    Ok(())
}

#[test]
fn up_to_date_goal_reports_nothing_to_do() -> Result<()> {
    let project = Project::new();
    project
        .script("out: in\n\tcopy($<, $@)\n")
        .write("in", "x")
        .write("out", "x")
        .age("in", 120);
    maat(&project)?
        .arg("out")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to be done for `out`"));
    Ok(())
}

#[test]
fn print_data_base_lists_rules_with_locations() -> Result<()> {
    let project = Project::new();
    project.script("SRC = a.c\n\nprog: $(SRC)\n\tcc -o $@ $^\n");
    maat(&project)?
        .arg("--print-data-base")
        .assert()
        .success()
        .stdout(predicate::str::contains("prog:a.c"))
        .stdout(predicate::str::contains("code make.maat:3"));
    ensure!(!project.exists("prog"), "printing must not build");
    Ok(())
}

#[test]
fn print_data_base_as_json() -> Result<()> {
    let project = Project::new();
    project.script("out: in\n\tcopy($<, $@)\n");
    let output = maat(&project)?
        .args(["-p", "--json"])
        .output()
        .context("run maat -p --json")?;
    ensure!(output.status.success(), "json listing should succeed");
    let rules: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("parse json output")?;
    ensure!(
        rules == serde_json::json!([
            {"targets": ["out"], "sources": ["in"], "file": "make.maat", "line": 1}
        ]),
        "unexpected json: {rules}"
    );
    Ok(())
}

#[test]
fn missing_script_fails() -> Result<()> {
    let project = Project::new();
    maat(&project)?
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read build script"));
    Ok(())
}

#[test]
fn unbuildable_goal_fails_before_running_jobs() -> Result<()> {
    let project = Project::new();
    project.script("first:\n\ttouch($@)\n");
    maat(&project)?
        .args(["first", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no way to build `ghost`"));
    ensure!(!project.exists("first"), "no job may run");
    Ok(())
}

#[test]
fn translation_errors_point_at_the_script_line() -> Result<()> {
    let project = Project::new();
    project.script("A = 1\nthis is not valid\n");
    maat(&project)?
        .assert()
        .failure()
        .stderr(predicate::str::contains("make.maat:2"));
    Ok(())
}

#[test]
fn failed_command_reports_script_line() -> Result<()> {
    let project = Project::new();
    project.script("all: out\nout:\n\techo(start)\n\tshell(exit 2)\n");
    maat(&project)?
        .assert()
        .failure()
        .stderr(predicate::str::contains("make.maat:4"))
        .stderr(predicate::str::contains("from rule at make.maat:2"));
    Ok(())
}

#[test]
fn directory_flag_and_custom_file() -> Result<()> {
    let project = Project::new();
    project.write("sub/build.maat", "stamp:\n\ttouch($@)\n");
    Command::cargo_bin("maat")
        .context("locate maat binary")?
        .current_dir(project.root())
        .args(["-C", "sub", "-f", "build.maat"])
        .assert()
        .success();
    ensure!(project.exists("sub/stamp"), "rule paths are relative to -C");
    Ok(())
}

#[test]
fn emit_writes_program_listing() -> Result<()> {
    let project = Project::new();
    project.script("out:\n");
    maat(&project)?
        .args(["--emit", "listing.txt", "-p"])
        .assert()
        .success();
    ensure!(
        project.read("listing.txt")
            == "    1  rule out : \n    2  \tpass\n    3  register([out], [], \"make.maat\", 1)\n",
        "unexpected listing"
    );
    Ok(())
}

#[test]
fn keep_going_with_jobs() -> Result<()> {
    let project = Project::new();
    project.script(concat!(
        "all: a b c\n",
        "a:\n",
        "\tshell(exit 1)\n",
        "b:\n",
        "\ttouch($@)\n",
        "c:\n",
        "\ttouch($@)\n",
    ));
    maat(&project)?.args(["-k", "-j", "2"]).assert().failure();
    ensure!(project.exists("b") && project.exists("c"), "independent jobs run");
    ensure!(!project.exists("all"), "dependent of a failure is skipped");
    Ok(())
}
