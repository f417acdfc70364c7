use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary directory holding executable shell scripts for a test.
///
/// Deleted when dropped.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp script dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `body` as an executable `/bin/sh` script named `name`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        make_executable(&path);
        path
    }

    /// Same as [`ScriptDir::script`], returned as the `String` task
    /// definitions store.
    pub fn script_str(&self, name: &str, body: &str) -> String {
        self.script(name, body).to_string_lossy().into_owned()
    }

    /// Path of a (not yet existing) file scripts can touch as a side effect.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
