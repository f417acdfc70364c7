// src/logging.rs

//! Logging setup for `cronherd` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CRONHERD_LOG` environment variable, which accepts full `EnvFilter`
//!    directives (e.g. `info,cronherd::engine=debug`)
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for dry-run listings and
//! the result of `--execute`.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "CRONHERD_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(lvl.as_directive()),
        None => filter_from_env().unwrap_or_else(|| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

fn filter_from_env() -> Option<EnvFilter> {
    let raw = std::env::var(LOG_ENV_VAR).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match EnvFilter::try_new(raw) {
        Ok(filter) => Some(filter),
        Err(e) => {
            eprintln!("ignoring invalid {LOG_ENV_VAR}={raw:?}: {e}");
            None
        }
    }
}
