// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dag::DependencyGraph;
use crate::model::{TaskDefinition, DEFAULT_TIMEOUT_SECONDS};
use crate::types::StoreMode;

/// Top-level configuration exactly as read from a TOML file.
///
/// ```toml
/// [config]
/// store = "file"
/// state_dir = ".cronherd"
///
/// [task.backup]
/// script = "scripts/backup.sh"
/// cron = "0 0 2 * * *"
/// dependents = ["report"]
///
/// [task.report]
/// script = "scripts/report.sh"
/// cron = "0 0 6 * * MON"
/// ```
///
/// Not validated; convert with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<id>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
    /// Directory relative paths (scripts, `state_dir`) are resolved against.
    base_dir: PathBuf,
}

impl ConfigFile {
    /// Build without validation. Use `ConfigFile::try_from(raw)` instead
    /// unless the parts are already known to be valid.
    pub fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self {
            config,
            task,
            base_dir: PathBuf::new(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// `[config].state_dir`, resolved against the config directory.
    pub fn state_dir(&self) -> PathBuf {
        self.resolve(&self.config.state_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// One enabled-or-not definition per `[task.<id>]`, created by
    /// `[config].actor`.
    pub fn task_definitions(&self) -> Vec<TaskDefinition> {
        self.task
            .iter()
            .map(|(id, tc)| self.task_definition(id, tc))
            .collect()
    }

    fn task_definition(&self, id: &str, tc: &TaskConfig) -> TaskDefinition {
        let script = self.resolve(Path::new(&tc.script));
        let mut def = TaskDefinition::new(id, script.to_string_lossy(), tc.cron.trim());
        def.description = tc.description.clone();
        def.enabled = tc.enabled;
        def.env = tc.env.clone();
        def.max_retries = tc.max_retries;
        def.timeout_seconds = tc
            .timeout_seconds
            .unwrap_or(self.config.default_timeout_seconds);
        def.dependents = tc.dependents.iter().cloned().collect();
        def.created_by = Some(self.config.actor.clone());
        def.modified_by = Some(self.config.actor.clone());
        def
    }

    /// Parent -> dependent graph of the configured tasks.
    pub fn dependency_graph(&self) -> DependencyGraph {
        dependency_graph(&self.task)
    }
}

pub(crate) fn dependency_graph(tasks: &BTreeMap<String, TaskConfig>) -> DependencyGraph {
    DependencyGraph::from_edges(
        tasks
            .iter()
            .map(|(id, tc)| (id.as_str(), tc.dependents.iter().map(String::as_str))),
    )
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"memory"` (default) or `"file"`.
    #[serde(default)]
    pub store: StoreMode,

    /// Where the file store keeps its JSON documents.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// How long finalization waits for output readers after the process
    /// has exited or been killed.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,

    /// Timeout for tasks that don't set `timeout_seconds`.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Recorded as creator of config-defined tasks and as the actor of
    /// CLI-initiated actions.
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".cronherd")
}

fn default_drain_grace_ms() -> u64 {
    5000
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_actor() -> String {
    "system".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            store: StoreMode::default(),
            state_dir: default_state_dir(),
            drain_grace_ms: default_drain_grace_ms(),
            default_timeout_seconds: default_timeout_seconds(),
            actor: default_actor(),
        }
    }
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Script run through the platform shell; relative paths are resolved
    /// against the config file's directory.
    pub script: String,

    /// Six-field cron expression (seconds first).
    pub cron: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: Option<String>,

    /// Falls back to `[config].default_timeout_seconds`.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Stored with the task; runs are never retried.
    #[serde(default)]
    pub max_retries: u32,

    /// Tasks triggered after each successful run of this one.
    #[serde(default)]
    pub dependents: Vec<String>,

    /// Extra environment for the script, overriding inherited variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}
