// src/store/file.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::{MemoryStore, TaskStore};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::model::{ExecutionId, TaskDefinition, TaskExecution, TaskId};

/// Definitions document, relative to the state directory.
pub const DEFINITIONS_FILE: &str = "definitions.json";
/// Directory holding one `<execution id>.json` document per execution.
pub const EXECUTIONS_DIR: &str = "executions";

/// Stores definitions and executions as JSON documents under a state
/// directory (default `.cronherd`).
///
/// Reads are served from an in-memory copy loaded at [`FileStore::open`].
/// A save writes to disk first and only then updates the copy, so a failed
/// write leaves both unchanged. Saving an execution rewrites only that
/// execution's document.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: MemoryStore,
    /// Serialises read-modify-write of the definitions document.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let root = root.into();

        let definitions: BTreeMap<TaskId, TaskDefinition> =
            load_document(fs.as_ref(), &root.join(DEFINITIONS_FILE))?;
        let cache = MemoryStore::with_definitions(definitions.into_values());

        let mut executions = 0usize;
        for path in fs.list_files(&root.join(EXECUTIONS_DIR))? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(exec) = load_document::<Option<TaskExecution>>(fs.as_ref(), &path)? else {
                continue;
            };
            cache.save_execution(&exec)?;
            executions += 1;
        }

        info!(
            root = ?root,
            definitions = cache.list_definitions()?.len(),
            executions,
            "opened file store"
        );

        Ok(Self {
            root,
            fs,
            cache,
            write_lock: Mutex::new(()),
        })
    }

    fn execution_path(&self, id: ExecutionId) -> PathBuf {
        self.root.join(EXECUTIONS_DIR).join(format!("{id}.json"))
    }
}

impl TaskStore for FileStore {
    fn save_definition(&self, def: &TaskDefinition) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut map: BTreeMap<TaskId, TaskDefinition> = self
            .cache
            .list_definitions()?
            .into_iter()
            .map(|d| (d.task_id.clone(), d))
            .collect();
        map.insert(def.task_id.clone(), def.clone());

        save_document(self.fs.as_ref(), &self.root.join(DEFINITIONS_FILE), &map)?;
        self.cache.save_definition(def)?;
        debug!(task = %def.task_id, "stored task definition (file)");
        Ok(())
    }

    fn find_definition(&self, task_id: &str) -> Result<TaskDefinition> {
        self.cache.find_definition(task_id)
    }

    fn list_definitions(&self) -> Result<Vec<TaskDefinition>> {
        self.cache.list_definitions()
    }

    fn save_execution(&self, exec: &TaskExecution) -> Result<()> {
        save_document(self.fs.as_ref(), &self.execution_path(exec.id), exec)?;
        self.cache.save_execution(exec)
    }

    fn find_execution(&self, id: ExecutionId) -> Result<TaskExecution> {
        self.cache.find_execution(id)
    }

    fn list_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        self.cache.list_executions(task_id)
    }
}

fn load_document<T: DeserializeOwned + Default>(fs: &dyn FileSystem, path: &Path) -> Result<T> {
    if !fs.is_file(path) {
        return Ok(T::default());
    }
    let contents = fs.read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&contents)?)
}

fn save_document<T: Serialize + ?Sized>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    fs.write(path, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::model::Trigger;

    #[test]
    fn definitions_and_executions_survive_reopen() {
        let fs = MockFileSystem::new();
        let root = PathBuf::from("/state");

        let exec_id = {
            let store = FileStore::open(&root, Arc::new(fs.clone())).unwrap();
            store
                .save_definition(
                    &TaskDefinition::new("nightly", "/scripts/n.sh", "0 0 2 * * *")
                        .with_dependent("report"),
                )
                .unwrap();
            let mut exec = TaskExecution::begin("nightly", &Trigger::manual(Some("bob".into())));
            store.save_execution(&exec).unwrap();
            exec.record_exit(0);
            exec.finalize();
            store.save_execution(&exec).unwrap();
            exec.id
        };

        assert!(fs.is_file(&root.join(DEFINITIONS_FILE)));
        assert_eq!(
            fs.list_files(&root.join(EXECUTIONS_DIR)).unwrap(),
            vec![root.join(EXECUTIONS_DIR).join(format!("{exec_id}.json"))]
        );

        let reopened = FileStore::open(&root, Arc::new(fs)).unwrap();
        let def = reopened.find_definition("nightly").unwrap();
        assert!(def.dependents.contains("report"));

        let exec = reopened.find_execution(exec_id).unwrap();
        assert_eq!(exec.exit_code, Some(0));
        assert_eq!(exec.triggered_by.as_deref(), Some("bob"));
        assert_eq!(reopened.list_executions("nightly").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/state/definitions.json", "{ not json");
        let err = FileStore::open("/state", Arc::new(fs)).unwrap_err();
        assert!(matches!(err, crate::errors::CronherdError::JsonError(_)));
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let fs = MockFileSystem::new();
        let store = FileStore::open("/state", Arc::new(fs.clone())).unwrap();
        let def = TaskDefinition::new("a", "/a.sh", "0 0 * * * *");
        store.save_definition(&def).unwrap();

        fs.set_read_only(true);
        let err = store
            .save_definition(&def.clone().disabled())
            .unwrap_err();
        assert!(matches!(err, crate::errors::CronherdError::Other(_)));
        assert!(matches!(
            store.save_definition(&TaskDefinition::new("b", "/b.sh", "0 0 * * * *")),
            Err(crate::errors::CronherdError::Other(_))
        ));
        let exec = TaskExecution::begin("a", &Trigger::scheduled());
        assert!(store.save_execution(&exec).is_err());

        assert!(store.find_definition("a").unwrap().enabled);
        assert!(store.find_definition("b").unwrap_err().is_not_found());
        assert!(store.find_execution(exec.id).unwrap_err().is_not_found());
        assert_eq!(store.list_definitions().unwrap().len(), 1);
    }

    #[test]
    fn execution_save_touches_only_its_own_document() {
        let fs = MockFileSystem::new();
        let store = FileStore::open("/state", Arc::new(fs.clone())).unwrap();
        let first = TaskExecution::begin("a", &Trigger::scheduled());
        store.save_execution(&first).unwrap();
        let first_path = PathBuf::from(format!("/state/executions/{}.json", first.id));
        let before = fs.read_to_string(&first_path).unwrap();

        let mut second = TaskExecution::begin("a", &Trigger::scheduled());
        store.save_execution(&second).unwrap();
        second.record_exit(0);
        second.finalize();
        store.save_execution(&second).unwrap();

        assert_eq!(fs.read_to_string(&first_path).unwrap(), before);
        assert_eq!(fs.list_files(Path::new("/state/executions")).unwrap().len(), 2);
    }
}
