//! Scheduling tests driven through scripted runners.
//!
//! No child processes are spawned: every command body is looked up in a
//! [`ScriptedRunner`] script, and events are captured by a [`RecordingSink`].

use std::time::{Duration, Instant};

use donkey::core::definition::Settings;
use donkey::core::token::DisplayToken;
use donkey::error::Error;
use donkey::orchestrator::{RunRequest, resolve_run, run_definition};
use donkey::scheduler::Scheduler;
use donkey::test_support::{RecordingSink, ScriptedRunner, definition_file};

fn request(commands: &[&str]) -> RunRequest {
    RunRequest {
        commands: commands.iter().map(|c| c.to_string()).collect(),
        ..RunRequest::default()
    }
}

fn parallel(commands: &[&str]) -> RunRequest {
    RunRequest {
        parallel: Some(true),
        ..request(commands)
    }
}

#[tokio::test]
async fn lines_run_in_order_with_args_appended() {
    let file = definition_file("foo:\n- echo one\n- echo two\n- echo three\n");
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();
    let req = RunRequest {
        args: Some("--fast".to_string()),
        ..request(&["foo"])
    };

    let verdict = run_definition(&file, &req, &runner, &sink)
        .await
        .expect("run");

    assert_eq!(verdict.codes(), vec![0, 0, 0]);
    assert_eq!(
        runner.bodies(),
        vec!["echo one --fast", "echo two --fast", "echo three --fast"]
    );
    assert!(runner
        .invocations()
        .iter()
        .all(|invocation| invocation.command.interpreter == "bash"));
}

#[tokio::test]
async fn script_mode_runs_one_process() {
    let file = definition_file("foo:\n  script: true\n  run:\n  - L1\n  - L2\n");
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();

    let verdict = run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect("run");

    assert_eq!(runner.bodies(), vec!["L1\nL2"]);
    assert_eq!(verdict.codes(), vec![0]);
}

#[tokio::test]
async fn script_mode_rejects_args_before_running() {
    let file = definition_file("foo:\n  script: true\n  run: [a]\n");
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();
    let req = RunRequest {
        args: Some("x".to_string()),
        ..request(&["foo"])
    };

    let err = run_definition(&file, &req, &runner, &sink)
        .await
        .expect_err("config error");

    assert!(matches!(err, Error::Config(_)));
    assert!(runner.invocations().is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn sequential_group_stops_at_first_failure() {
    let file = definition_file("foo:\n- exit 1\n- echo after\n");
    let runner = ScriptedRunner::new().on("exit 1", 1, Duration::ZERO);
    let sink = RecordingSink::new();

    let err = run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect_err("failure");

    assert_eq!(runner.bodies(), vec!["exit 1"]);
    match err {
        Error::RunFailure {
            message,
            codes,
            exit_code,
        } => {
            assert_eq!(message, "commands failed, return codes: 1");
            assert_eq!(codes, vec![1]);
            assert_eq!(exit_code, 1);
        }
        other => panic!("expected run failure, got {other:?}"),
    }
}

#[tokio::test]
async fn sequential_groups_finish_before_the_next_starts() {
    let file = definition_file("foo: [echo foo]\nbar: [echo bar]\n");
    let runner = ScriptedRunner::new().on("echo foo", 0, Duration::from_millis(30));
    let sink = RecordingSink::new();

    run_definition(&file, &request(&["foo", "bar"]), &runner, &sink)
        .await
        .expect("run");

    let messages = sink.messages();
    let foo_started = sink.position("Running \"foo\"...").expect("foo started");
    let bar_started = sink.position("Running \"bar\"...").expect("bar started");
    let foo_finished = messages
        .iter()
        .position(|m| m.starts_with("\"foo\" finished in"))
        .expect("foo finished");
    assert!(foo_started < foo_finished);
    assert!(foo_finished < bar_started);
    assert_eq!(runner.bodies(), vec!["echo foo", "echo bar"]);
}

#[tokio::test]
async fn sequential_failure_skips_later_groups() {
    let file = definition_file("foo: [echo foo]\nbar: [exit 4]\nbaz: [echo baz]\n");
    let runner = ScriptedRunner::new().on("exit 4", 4, Duration::ZERO);
    let sink = RecordingSink::new();

    let err = run_definition(&file, &request(&["foo", "bar", "baz"]), &runner, &sink)
        .await
        .expect_err("failure");

    assert_eq!(runner.bodies(), vec!["echo foo", "exit 4"]);
    assert!(sink.position("Running \"baz\"...").is_none());
    assert!(matches!(
        err,
        Error::RunFailure { ref codes, exit_code: 4, .. } if codes == &vec![0, 4]
    ));
}

#[tokio::test]
async fn parallel_groups_overlap_with_distinct_tokens() {
    let file = definition_file("foo: [sleep foo]\nbar: [sleep bar]\n");
    let delay = Duration::from_millis(300);
    let runner = ScriptedRunner::new()
        .on("sleep foo", 0, delay)
        .on("sleep bar", 0, delay);
    let sink = RecordingSink::new();

    let start = Instant::now();
    let verdict = run_definition(&file, &parallel(&["foo", "bar"]), &runner, &sink)
        .await
        .expect("run");
    let elapsed = start.elapsed();

    assert!(verdict.success());
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2, "groups did not overlap: {elapsed:?}");

    let tokens = sink.started_tokens();
    assert_eq!(tokens, vec![Some(DisplayToken::at(0)), Some(DisplayToken::at(1))]);
}

#[tokio::test]
async fn parallel_runs_every_group_despite_failures() {
    let file = definition_file("foo: [slow fail]\nbar: [fast fail]\nbaz: [ok]\n");
    let runner = ScriptedRunner::new()
        .on("slow fail", 3, Duration::from_millis(100))
        .on("fast fail", 5, Duration::ZERO);
    let sink = RecordingSink::new();

    let err = run_definition(&file, &parallel(&["foo", "bar", "baz"]), &runner, &sink)
        .await
        .expect_err("failure");

    assert_eq!(runner.invocations().len(), 3);
    match err {
        Error::RunFailure {
            message,
            codes,
            exit_code,
        } => {
            assert_eq!(message, "commands failed, return codes: 0, 3, 5");
            assert_eq!(codes, vec![3, 5, 0]);
            assert_eq!(exit_code, 3, "first failure follows declaration order");
        }
        other => panic!("expected run failure, got {other:?}"),
    }
}

#[tokio::test]
async fn single_command_run_has_no_token() {
    let file = definition_file("foo: [echo foo]\n");
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();

    run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect("run");

    assert!(sink.events().iter().all(|event| event.token().is_none()));
    assert_eq!(runner.invocations()[0].token, None);
}

#[tokio::test]
async fn lone_sequential_group_has_no_token() {
    let file = definition_file("foo: [a, b, c]\n");
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();

    run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect("run");

    assert_eq!(sink.started_tokens(), vec![None]);
    assert!(runner.invocations().iter().all(|i| i.token.is_none()));
}

#[tokio::test]
async fn parallel_group_fans_out_per_command() {
    let file = definition_file("foo:\n  parallel: true\n  run: [a, b]\n");
    let runner = ScriptedRunner::new()
        .on("a", 0, Duration::from_millis(50))
        .on("b", 0, Duration::from_millis(50));
    let sink = RecordingSink::new();

    let verdict = run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect("run");

    assert_eq!(verdict.groups.len(), 1);
    assert_eq!(verdict.groups[0].name, "foo");
    assert_eq!(verdict.codes(), vec![0, 0]);
    assert!(sink.position("Running \"foo: a\"...").is_some());
    assert!(sink.position("Running \"foo: b\"...").is_some());

    let tokens = sink.started_tokens();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(Option::is_some));
    assert_ne!(tokens[0], tokens[1]);

    let invocations = runner.invocations();
    assert_eq!(invocations[0].token, tokens[0]);
    assert_eq!(invocations[1].token, tokens[1]);
}

#[tokio::test]
async fn parallel_group_siblings_finish_despite_failures() {
    let file = definition_file("foo:\n  parallel: true\n  run: [slow, fast]\n");
    let runner = ScriptedRunner::new()
        .on("slow", 3, Duration::from_millis(100))
        .on("fast", 5, Duration::ZERO);
    let sink = RecordingSink::new();

    let err = run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect_err("failure");

    assert_eq!(runner.bodies(), vec!["slow", "fast"]);
    match err {
        Error::RunFailure {
            codes, exit_code, ..
        } => {
            assert_eq!(codes, vec![3, 5], "codes follow launch order");
            assert_eq!(exit_code, 3);
        }
        other => panic!("expected run failure, got {other:?}"),
    }

    let messages = sink.messages();
    let slow_finished = messages
        .iter()
        .position(|m| m.starts_with("\"foo: slow\" finished in"))
        .expect("slow finished");
    let fast_finished = messages
        .iter()
        .position(|m| m.starts_with("\"foo: fast\" finished in"))
        .expect("fast finished");
    assert!(fast_finished < slow_finished);
}

#[tokio::test]
async fn repeated_runs_hand_out_the_same_tokens() {
    let file = definition_file("foo: [a]\nbar: [exit 2]\n");
    let resolved = resolve_run(&file, &parallel(&["foo", "bar"])).expect("resolve");
    let runner = ScriptedRunner::new().on("exit 2", 2, Duration::ZERO);
    let sink = RecordingSink::new();
    let scheduler = Scheduler::new(&runner, &sink);

    let first = scheduler
        .run(&resolved.groups, resolved.parallel)
        .await
        .expect("first run");
    let second = scheduler
        .run(&resolved.groups, resolved.parallel)
        .await
        .expect("second run");

    assert_eq!(first.codes(), second.codes());
    assert_eq!(first.first_failure(), Some(2));
    assert_eq!(second.first_failure(), Some(2));

    let tokens = sink.started_tokens();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[..2], tokens[2..]);
}

#[tokio::test]
async fn merged_settings_reach_every_command() {
    let file = definition_file(
        ".settings:\n  STAGE: dev\n  REGION: eu\nfoo:\n  settings:\n    STAGE: prod\n  run: [a, b]\n",
    );
    let runner = ScriptedRunner::new();
    let sink = RecordingSink::new();

    run_definition(&file, &request(&["foo"]), &runner, &sink)
        .await
        .expect("run");

    let expected: Settings = [("REGION", "eu"), ("STAGE", "prod")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for invocation in runner.invocations() {
        assert_eq!(invocation.env, expected);
    }
}
