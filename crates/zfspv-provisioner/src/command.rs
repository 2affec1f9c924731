use crate::error::{ProvisionerError, Result};
use std::ffi::OsStr;
use tracing::debug;

/// Captured result of a finished child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `CommandFailed`
    pub fn check(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProvisionerError::command_failed(
                self.command,
                self.exit_code,
                self.stderr.trim(),
            ))
        }
    }
}

/// Run a program to completion, returning its output whatever the exit code.
///
/// Only a failure to spawn is reported as an error. The child is not killed if
/// the returned future is dropped, so an interrupted caller never aborts a
/// `zfs` mutation halfway.
pub async fn run_unchecked<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
) -> Result<CommandOutput> {
    let program = program.as_ref();
    let command = render(program, args);
    debug!("Executing: {}", command);

    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(false)
        .output()
        .await
        .map_err(|e| ProvisionerError::command_failed(&command, -1, e.to_string()))?;

    let exit_code = output.status.code().unwrap_or(-1);
    debug!("Command exited with code {}: {}", exit_code, command);

    Ok(CommandOutput {
        command,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
    })
}

fn render<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(OsStr::new))
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command_line() {
        let line = render(OsStr::new("zfs"), &["destroy", "-r", "tank/pv"]);
        assert_eq!(line, "zfs destroy -r tank/pv");
    }

    #[test]
    fn test_check_maps_non_zero_exit() {
        let output = CommandOutput {
            command: "zfs create tank/pv".to_string(),
            stdout: String::new(),
            stderr: "cannot create 'tank/pv': dataset already exists\n".to_string(),
            exit_code: 1,
        };
        match output.check() {
            Err(ProvisionerError::CommandFailed {
                command,
                exit_code,
                stderr,
            }) => {
                assert_eq!(command, "zfs create tank/pv");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "cannot create 'tank/pv': dataset already exists");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_command_failed() {
        let result = run_unchecked("zfspv-definitely-not-a-binary", &["--version"]).await;
        assert!(matches!(
            result,
            Err(ProvisionerError::CommandFailed { exit_code: -1, .. })
        ));
    }
}
