// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cronherd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cronherd",
    version,
    about = "Run scripts on cron schedules and trigger their dependents on success.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Cronherd.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Cronherd.toml")]
    pub config: String,

    /// Run this task once now, wait for it and any dependents it triggers,
    /// then exit (0 if the task succeeded, 1 otherwise).
    #[arg(long, value_name = "TASK", conflicts_with = "dry_run")]
    pub execute: Option<String>,

    /// Actor recorded for audit entries caused by this invocation.
    ///
    /// Falls back to `[config].actor`.
    #[arg(long, value_name = "NAME")]
    pub actor: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CRONHERD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks and their next fire times, but don't
    /// schedule or execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
