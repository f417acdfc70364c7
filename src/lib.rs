// src/lib.rs

pub mod audit;
pub mod cli;
pub mod config;
pub mod cron;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod publish;
pub mod store;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info, warn};

use crate::audit::audit_from_config;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{SchedulerParts, TaskScheduler};
use crate::exec::SupervisorOptions;
use crate::fs::RealFileSystem;
use crate::model::TaskDefinition;
use crate::publish::LogPublisher;
use crate::store::{store_from_config, TaskStore};
use crate::types::ExecutionStatus;

/// High-level entry point used by `main.rs`; returns the process exit code.
///
/// This wires together:
/// - config loading
/// - store, executor and schedule registry
/// - `--dry-run` listing, `--execute` one-shot runs, or the daemon loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {:?}", config_path))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let actor = args
        .actor
        .clone()
        .unwrap_or_else(|| cfg.config.actor.clone());

    let store = store_from_config(&cfg)?;
    let audit = audit_from_config(&cfg)?;
    sync_definitions(store.as_ref(), &cfg)?;

    let scheduler = TaskScheduler::new(SchedulerParts {
        store,
        publisher: Arc::new(LogPublisher),
        audit,
        fs: Arc::new(RealFileSystem),
        options: SupervisorOptions {
            drain_grace: Duration::from_millis(cfg.config.drain_grace_ms),
        },
    });

    match args.execute {
        Some(task_id) => execute_once(&scheduler, &task_id, &actor).await,
        None => run_daemon(&scheduler).await,
    }
}

/// Write every configured task into the store.
///
/// Creation metadata of tasks that already exist is kept.
fn sync_definitions(store: &dyn TaskStore, cfg: &ConfigFile) -> Result<()> {
    for mut def in cfg.task_definitions() {
        if let Ok(existing) = store.find_definition(&def.task_id) {
            def.created_by = existing.created_by;
            def.created_at = existing.created_at;
        }
        store.save_definition(&def)?;
    }
    debug!(tasks = cfg.task.len(), "definitions synced to store");
    Ok(())
}

async fn execute_once(scheduler: &TaskScheduler, task_id: &str, actor: &str) -> Result<i32> {
    let exec = scheduler.execute_manually(task_id, Some(actor)).await?;

    // Let dependents triggered by this run finish too.
    scheduler.wait_idle().await;

    println!(
        "{} {} exit={} elapsed={}ms",
        exec.task_id,
        exec.status,
        exec.exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        exec.elapsed_ms.unwrap_or_default()
    );
    if let Some(message) = &exec.error_message {
        println!("  error: {message}");
    }

    Ok(if exec.status == ExecutionStatus::Success {
        0
    } else {
        1
    })
}

async fn run_daemon(scheduler: &TaskScheduler) -> Result<i32> {
    let report = scheduler.initialize_all()?;
    for (task, reason) in report.failed.iter() {
        warn!(task = %task, reason = %reason, "task not scheduled");
    }
    info!(scheduled = ?report.scheduled, "cronherd running; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;

    info!(
        in_flight = scheduler.executor().in_flight(),
        "shutdown requested; stopping schedules"
    );
    scheduler.shutdown();

    // A second Ctrl-C abandons executions still running.
    tokio::select! {
        _ = scheduler.wait_idle() => info!("all executions finished"),
        _ = tokio::signal::ctrl_c() => warn!("second Ctrl-C; exiting without waiting"),
    }

    Ok(0)
}

/// Print tasks, next fire times and dependents without scheduling anything.
fn print_dry_run(cfg: &ConfigFile) {
    let now = Local::now();
    println!("cronherd dry-run");
    println!("  config.store = {:?}", cfg.config.store);
    println!("  config.state_dir = {}", cfg.state_dir().display());
    println!("  config.drain_grace_ms = {}", cfg.config.drain_grace_ms);
    println!();

    let graph = cfg.dependency_graph();
    let definitions: Vec<TaskDefinition> = cfg.task_definitions();

    println!("tasks ({}):", definitions.len());
    for def in definitions.iter() {
        println!("  - {}", def.task_id);
        if let Some(ref description) = def.description {
            println!("      description: {description}");
        }
        println!("      script: {}", def.script_path);
        println!("      cron: {}", def.cron_expression);
        if !def.enabled {
            println!("      enabled: false");
        }
        match crate::cron::next_fire(&def.cron_expression, &now) {
            Ok(Some(next)) => println!("      next: {}", next.format("%Y-%m-%d %H:%M:%S %Z")),
            Ok(None) => println!("      next: never"),
            Err(e) => println!("      next: invalid ({e})"),
        }
        println!("      timeout: {}s", def.timeout_seconds);
        let dependents = graph.dependents_of(&def.task_id);
        if !dependents.is_empty() {
            println!("      dependents: {:?}", dependents);
        }
        if !def.env.is_empty() {
            println!("      env: {:?}", def.env.keys().collect::<Vec<_>>());
        }
    }

    for (task, dependent) in graph.unknown_dependents() {
        println!("warning: task '{task}' lists unknown dependent '{dependent}'");
    }
    for cycle in graph.cycles() {
        println!("warning: dependency cycle {:?}", cycle);
    }

    debug!("dry-run complete (no execution)");
}
