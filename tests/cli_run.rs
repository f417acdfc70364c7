// tests/cli_run.rs
#![cfg(unix)]

mod common;

use std::fs;

use common::{init_tracing, with_timeout, ScriptDir};
use cronherd::cli::CliArgs;
use cronherd::run;

fn args(config: &std::path::Path, execute: Option<&str>, dry_run: bool) -> CliArgs {
    CliArgs {
        config: config.to_string_lossy().into_owned(),
        execute: execute.map(str::to_string),
        actor: Some("tester".to_string()),
        log_level: None,
        dry_run,
    }
}

fn write_config(dir: &ScriptDir, body_ok: &str, body_child: &str) -> std::path::PathBuf {
    dir.script("parent.sh", body_ok);
    dir.script("child.sh", body_child);
    let path = dir.path().join("Cronherd.toml");
    fs::write(
        &path,
        r#"
[config]
drain_grace_ms = 500

[task.parent]
script = "parent.sh"
cron = "0 0 0 1 1 *"
dependents = ["child"]

[task.child]
script = "child.sh"
cron = "0 0 0 1 1 *"
"#,
    )
    .unwrap();
    path
}

#[tokio::test]
async fn execute_runs_task_and_its_dependents_then_exits_zero() {
    init_tracing();
    let dir = ScriptDir::new();
    let marker = dir.marker("child-ran");
    let config = write_config(
        &dir,
        "echo parent",
        &format!("touch '{}'", marker.display()),
    );

    let code = with_timeout(run(args(&config, Some("parent"), false)))
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert!(marker.exists(), "dependent ran before run() returned");
}

#[tokio::test]
async fn execute_reports_failure_with_exit_one() {
    init_tracing();
    let dir = ScriptDir::new();
    let config = write_config(&dir, "exit 2", "true");

    let code = with_timeout(run(args(&config, Some("parent"), false)))
        .await
        .unwrap();

    assert_eq!(code, 1);
}

#[tokio::test]
async fn execute_of_unknown_task_is_an_error() {
    init_tracing();
    let dir = ScriptDir::new();
    let config = write_config(&dir, "true", "true");

    let result = with_timeout(run(args(&config, Some("nope"), false))).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let dir = ScriptDir::new();
    let marker = dir.marker("ran");
    let config = write_config(
        &dir,
        &format!("touch '{}'", marker.display()),
        "true",
    );

    let code = run(args(&config, None, true)).await.unwrap();

    assert_eq!(code, 0);
    assert!(!marker.exists());
}

#[tokio::test]
async fn file_store_keeps_executions_and_audit_across_runs() {
    init_tracing();
    let dir = ScriptDir::new();
    dir.script("job.sh", "echo ok");
    let config = dir.path().join("Cronherd.toml");
    fs::write(
        &config,
        r#"
[config]
store = "file"
drain_grace_ms = 500

[task.job]
script = "job.sh"
cron = "0 0 0 1 1 *"
"#,
    )
    .unwrap();

    for _ in 0..2 {
        let code = with_timeout(run(args(&config, Some("job"), false)))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    let state = dir.path().join(".cronherd");
    let executions = fs::read_dir(state.join("executions")).unwrap().count();
    assert_eq!(executions, 2);

    let audit = fs::read_to_string(state.join("audit.jsonl")).unwrap();
    let manual: Vec<&str> = audit
        .lines()
        .filter(|l| l.contains("MANUAL_EXECUTION"))
        .collect();
    assert_eq!(manual.len(), 2);
    assert!(manual.iter().all(|l| l.contains("\"tester\"")));
}
