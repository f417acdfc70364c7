#![allow(dead_code)]

use std::collections::BTreeMap;

use cronherd::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use cronherd::types::StoreMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_store(mut self, store: StoreMode, state_dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.config.store = store;
        self.config.config.state_dir = state_dir.into();
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.config.config.actor = actor.to_string();
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(script: &str, cron: &str) -> Self {
        Self {
            task: TaskConfig {
                script: script.to_string(),
                cron: cron.to_string(),
                enabled: true,
                description: None,
                timeout_seconds: None,
                max_retries: 0,
                dependents: vec![],
                env: BTreeMap::new(),
            },
        }
    }

    pub fn dependent(mut self, task: &str) -> Self {
        self.task.dependents.push(task.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.task.timeout_seconds = Some(seconds);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.task.enabled = false;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
