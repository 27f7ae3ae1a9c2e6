//! End-to-end build scenarios driven through the library.
//!
//! Each test writes a build script into a temporary tree, evaluates it and
//! runs the resulting plan with a recording monitor.

use anyhow::{Context, Result, ensure};
use maat::make::{self, BuildReport, MakeError, MakeOptions, Policy, RunContext};
use maat::monitor::{Level, RecordingMonitor};
use maat::script::{Evaluation, LoadContext, Script};
use maat::stdlib::Stdlib;
use rstest::{fixture, rstest};
use test_support::{Project, SCRIPT};

#[fixture]
fn project() -> Project {
    Project::new()
}

struct Outcome {
    report: Result<BuildReport, MakeError>,
    monitor: RecordingMonitor,
}

fn load(project: &Project, monitor: &RecordingMonitor, stdlib: &Stdlib) -> Result<Evaluation> {
    let script = Script::load_in(project.root(), SCRIPT)?;
    let ctx = LoadContext {
        root: project.root(),
        stdlib,
        monitor,
    };
    Ok(script.translate()?.eval(&ctx)?)
}

fn build(project: &Project, goals: &[&str], options: MakeOptions) -> Result<Outcome> {
    let monitor = RecordingMonitor::new();
    let stdlib = Stdlib::new();
    let evaluation = load(project, &monitor, &stdlib).context("load script")?;
    let goals: Vec<String> = if goals.is_empty() {
        evaluation.default_goal.iter().cloned().collect()
    } else {
        goals.iter().map(|&goal| goal.to_owned()).collect()
    };
    let ctx = RunContext {
        env: &evaluation.env,
        stdlib: &stdlib,
        root: project.root(),
        monitor: &monitor,
        remapper: &evaluation.remapper,
    };
    let report = make::make(&evaluation.db, &goals, &ctx, options);
    Ok(Outcome { report, monitor })
}

#[rstest]
fn copy_rule_runs_once_then_is_fresh(project: Project) -> Result<()> {
    project
        .script("out: in\n\tcopy($< , $@)\n")
        .write("in", "payload")
        .age("in", 60);

    let first = build(&project, &[], MakeOptions::default())?;
    let report = first.report?;
    ensure!(report.executed == ["out"], "one job expected: {report:?}");
    ensure!(project.read("out") == "payload", "copy should use literal paths");

    let second = build(&project, &["out"], MakeOptions::default())?;
    let report = second.report?;
    ensure!(report.executed.is_empty(), "rerun should do nothing: {report:?}");
    ensure!(second.monitor.messages(Level::Info).is_empty(), "no job should start");
    Ok(())
}

#[rstest]
fn touched_source_triggers_rebuild(project: Project) -> Result<()> {
    project
        .script("out: in\n\tcopy($<, $@)\n")
        .write("in", "v1")
        .write("out", "old")
        .age("out", 60);
    let report = build(&project, &["out"], MakeOptions::default())?.report?;
    ensure!(report.executed == ["out"], "newer source must rebuild");
    ensure!(project.read("out") == "v1", "output refreshed");
    Ok(())
}

#[rstest]
fn action_variables_see_the_final_binding(project: Project) -> Result<()> {
    project.script("MSG = early\nout:\n\techo($(MSG))\nMSG = late\n");
    let outcome = build(&project, &["out"], MakeOptions::default())?;
    let report = outcome.report?;
    ensure!(report.success(), "build should succeed: {report:?}");
    let printed = outcome.monitor.messages(Level::Print);
    ensure!(printed == ["late"], "expected the last assignment, got {printed:?}");
    Ok(())
}

#[rstest]
fn jobs_follow_dependency_order(project: Project) -> Result<()> {
    project
        .script(concat!(
            "OBJS = a.o b.o\n",
            "prog: $(OBJS)\n",
            "\twrite($@, linked $^)\n",
            "\n",
            "a.o: a.c\n",
            "\twrite($@, compiled $<)\n",
            "b.o: b.c\n",
            "\twrite($@, compiled $<)\n",
        ))
        .write("a.c", "")
        .write("b.c", "");
    let report = build(&project, &[], MakeOptions::default())?.report?;
    ensure!(
        report.executed == ["a.o", "b.o", "prog"],
        "unexpected order: {:?}",
        report.executed
    );
    ensure!(project.read("prog") == "linked a.o b.o", "sources expand in order");
    ensure!(project.read("a.o") == "compiled a.c", "first source expands");
    Ok(())
}

#[rstest]
fn shared_producer_is_scheduled_once(project: Project) -> Result<()> {
    project
        .script(concat!(
            "all: app tool\n",
            "app: config.h\n",
            "\ttouch($@)\n",
            "tool: config.h\n",
            "\ttouch($@)\n",
            "config.h:\n",
            "\twrite($@, #define X 1)\n",
        ));
    let outcome = build(&project, &[], MakeOptions::default())?;
    let report = outcome.report?;
    let config_jobs = report.executed.iter().filter(|job| *job == "config.h").count();
    ensure!(config_jobs == 1, "config.h built {config_jobs} times");
    ensure!(report.executed.len() == 4, "all, app, tool and config.h: {report:?}");
    Ok(())
}

#[rstest]
fn unbuildable_goal_runs_nothing(project: Project) -> Result<()> {
    project.script("out: missing.c\n\ttouch($@)\nother:\n\ttouch($@)\n");
    let outcome = build(&project, &["other", "out"], MakeOptions::default())?;
    let Err(MakeError::NoRule { goal, needed_by }) = outcome.report else {
        anyhow::bail!("expected a resolution failure");
    };
    ensure!(goal == "missing.c", "wrong goal {goal}");
    ensure!(needed_by.as_deref() == Some("out"), "dependent not named");
    ensure!(!project.exists("other"), "no job may run after a resolution error");
    Ok(())
}

#[rstest]
fn cycles_are_fatal(project: Project) -> Result<()> {
    project.script("a: b\n\ttouch($@)\nb: a\n\ttouch($@)\n");
    let outcome = build(&project, &[], MakeOptions::default())?;
    let Err(MakeError::Cycle { cycle }) = outcome.report else {
        anyhow::bail!("expected a cycle");
    };
    ensure!(cycle == ["a", "b", "a"], "cycle {cycle:?}");
    Ok(())
}

#[rstest]
#[case(Policy::FailFast, 1)]
#[case(Policy::KeepGoing, 4)]
fn policy_controls_independent_jobs(
    project: Project,
    #[case] policy: Policy,
    #[case] jobs: usize,
) -> Result<()> {
    project.script(concat!(
        "all: broken fine\n",
        "broken: bad\n",
        "\ttouch($@)\n",
        "bad:\n",
        "\tshell(exit 3)\n",
        "fine:\n",
        "\ttouch($@)\n",
    ));
    let outcome = build(&project, &[], MakeOptions { jobs, policy })?;
    let report = outcome.report?;
    ensure!(report.failures.len() == 1, "one failure expected");
    ensure!(!project.exists("broken"), "dependent of a failure must not run");
    ensure!(
        project.exists("fine") == (policy == Policy::KeepGoing),
        "independent job under {policy:?}"
    );
    let errors = outcome.monitor.messages(Level::Error);
    ensure!(
        errors.iter().any(|message| message.contains("make.maat:5")),
        "failure must name the script line: {errors:?}"
    );
    Ok(())
}

#[rstest]
fn parallel_build_produces_every_target(project: Project) -> Result<()> {
    let mut script = String::from("all: ");
    let names: Vec<String> = (0..8).map(|n| format!("part{n}.txt")).collect();
    script.push_str(&names.join(" "));
    script.push_str("\n\twrite($@, done)\n");
    for name in &names {
        script.push_str(&format!("{name}:\n\twrite($@, $@)\n"));
    }
    project.script(&script);
    let options = MakeOptions {
        jobs: 4,
        policy: Policy::FailFast,
    };
    let report = build(&project, &[], options)?.report?;
    ensure!(report.success(), "parallel build failed: {report:?}");
    ensure!(report.executed.last().map(String::as_str) == Some("all"), "all runs last");
    for name in &names {
        ensure!(project.read(name) == *name, "{name} not written");
    }
    Ok(())
}

#[rstest]
fn failure_lines_are_script_lines(project: Project) -> Result<()> {
    project.script(concat!(
        "CC = cc\n",
        "\n",
        "# output\n",
        "OUT = out.txt\n",
        "out.txt: in.txt\n",
        "\techo(building)\n",
        "\tshell(false)\n",
        "\techo(never)\n",
        "X = 1\n",
    ));
    project.write("in.txt", "");
    let program = Script::load_in(project.root(), SCRIPT)?.translate()?;
    ensure!(
        program.remap().boundaries() == [9],
        "registration expected at generated line 9"
    );
    let outcome = build(&project, &[], MakeOptions::default())?;
    let report = outcome.report?;
    let failure = report.failures.first().context("one failure")?;
    ensure!(failure.error.location.line == 7, "got {}", failure.error.location);
    ensure!(
        failure.error.trace.first().map(|frame| frame.line) == Some(5),
        "trace must end at the rule header"
    );
    Ok(())
}

#[rstest]
fn lines_after_injected_code_are_remapped(project: Project) -> Result<()> {
    project.script(concat!(
        "all: out\n",
        "out:\n",
        "\techo(start)\n",
        "\tcopy(nope)\n",
    ));
    let program = Script::load_in(project.root(), SCRIPT)?.translate()?;
    ensure!(
        program.remap().boundaries() == [2, 3, 7],
        "boundaries {:?}",
        program.remap().boundaries()
    );
    let outcome = build(&project, &["out"], MakeOptions::default())?;
    let report = outcome.report?;
    let failure = report.failures.first().context("one failure")?;
    ensure!(
        failure.error.location.to_string() == "make.maat:4",
        "generated line 6 must map to script line 4, got {}",
        failure.error.location
    );
    Ok(())
}
