// src/config/validate.rs

use tracing::warn;

use crate::config::model::{dependency_graph, ConfigFile, RawConfigFile};
use crate::cron::CronExpr;
use crate::errors::{CronherdError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CronherdError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

/// Check a raw config; warnings are logged, hard errors returned.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_dependents(cfg)?;
    warn_on_cycles(cfg);
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(CronherdError::ConfigError(
            "config must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.drain_grace_ms == 0 {
        return Err(CronherdError::ConfigError(
            "[config].drain_grace_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.default_timeout_seconds == 0 {
        return Err(CronherdError::ConfigError(
            "[config].default_timeout_seconds must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.script.trim().is_empty() {
            return Err(CronherdError::ConfigError(format!(
                "task '{}' has an empty `script`",
                name
            )));
        }
        if task.timeout_seconds == Some(0) {
            return Err(CronherdError::ConfigError(format!(
                "task '{}': timeout_seconds must be >= 1 (got 0)",
                name
            )));
        }
        CronExpr::parse(&task.cron).map_err(|e| {
            CronherdError::ConfigError(format!("task '{}': {}", name, e))
        })?;
    }
    Ok(())
}

fn validate_dependents(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.dependents.iter() {
            if dep == name {
                return Err(CronherdError::ConfigError(format!(
                    "task '{}' cannot list itself in `dependents`",
                    name
                )));
            }
            if !cfg.task.contains_key(dep) {
                warn!(
                    task = %name,
                    dependent = %dep,
                    "unknown dependent; it will be skipped when the task succeeds"
                );
            }
        }
    }
    Ok(())
}

/// Loops are allowed: each successful run keeps re-triggering the next task
/// of the loop. Worth a warning, not a rejection.
fn warn_on_cycles(cfg: &RawConfigFile) {
    for cycle in dependency_graph(&cfg.task).cycles() {
        warn!(
            tasks = ?cycle,
            "dependency cycle: these tasks will keep triggering each other while they succeed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_text: &str) -> RawConfigFile {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn accepts_cycles_and_unknown_dependents() {
        let cfg = raw(
            r#"
            [task.a]
            script = "a.sh"
            cron = "0 * * * * *"
            dependents = ["b", "ghost"]

            [task.b]
            script = "b.sh"
            cron = "0 * * * * *"
            dependents = ["a"]
            "#,
        );
        let cfg = ConfigFile::try_from(cfg).unwrap();
        assert_eq!(cfg.dependency_graph().cycles().len(), 1);
    }

    #[test]
    fn rejects_self_dependency() {
        let cfg = raw(
            r#"
            [task.a]
            script = "a.sh"
            cron = "0 * * * * *"
            dependents = ["a"]
            "#,
        );
        let err = ConfigFile::try_from(cfg).unwrap_err();
        assert!(err.to_string().contains("itself"), "{err}");
    }

    #[test]
    fn rejects_bad_cron_with_task_name() {
        let cfg = raw(
            r#"
            [task.nightly]
            script = "n.sh"
            cron = "0 0 25 * * *"
            "#,
        );
        let err = ConfigFile::try_from(cfg).unwrap_err();
        assert!(matches!(err, CronherdError::ConfigError(_)));
        assert!(err.to_string().contains("nightly"), "{err}");
    }

    #[test]
    fn rejects_zero_drain_grace_and_empty_config() {
        let cfg = raw(
            r#"
            [config]
            drain_grace_ms = 0

            [task.a]
            script = "a.sh"
            cron = "* * * * * *"
            "#,
        );
        assert!(ConfigFile::try_from(cfg).is_err());
        assert!(ConfigFile::try_from(raw("")).is_err());
    }
}
