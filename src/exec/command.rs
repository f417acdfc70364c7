// src/exec/command.rs

//! Shell invocation for a task's script.

use std::process::Stdio;

use tokio::process::Command;

use crate::model::TaskDefinition;

/// Program and leading arguments of the platform shell.
pub fn shell_program() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// Build the command for one execution of `task`.
///
/// - The script path is handed to the platform shell as the command.
/// - The parent environment is inherited; `task.env` entries override it.
/// - stdout and stderr are piped separately (never merged).
/// - The child is killed if the handle is dropped before it exits.
pub fn shell_command(task: &TaskDefinition) -> Command {
    let (program, flag) = shell_program();
    let mut cmd = Command::new(program);
    cmd.arg(flag).arg(&task.script_path);

    cmd.envs(&task.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_runs_script_through_shell_with_env() {
        let task = TaskDefinition::new("a", "/opt/jobs/a.sh", "* * * * * *")
            .with_env("FOO", "bar");
        let cmd = shell_command(&task);
        let std_cmd = cmd.as_std();

        let (program, flag) = shell_program();
        assert_eq!(std_cmd.get_program(), program);
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, vec![flag, "/opt/jobs/a.sh"]);

        let envs: Vec<_> = std_cmd.get_envs().collect();
        assert!(envs
            .iter()
            .any(|(k, v)| *k == "FOO" && v.map(|v| v == "bar").unwrap_or(false)));
    }
}
