//! Bounded subprocess execution
//!
//! Every external tool the bootstrap touches (tar, the interpreter, pip,
//! build scripts) goes through [`run_with_timeout`]. A child that overruns
//! its limit is killed when its future is dropped.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::process::Command;
use tokio::time::timeout;

use super::error::ProcessError;

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stderr mentions an error even though the exit code may claim success
    ///
    /// Some archive tools (PowerShell in particular) exit 0 after printing an
    /// exception.
    pub fn reports_errors(&self) -> bool {
        let stderr = self.stderr.to_ascii_lowercase();
        ["exception", "error", "cannot access"]
            .iter()
            .any(|marker| stderr.contains(marker))
    }

    /// Convert a non-zero exit into a [`ProcessError`]
    pub fn into_result(self, program: &str) -> Result<Self, ProcessError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProcessError::NonZeroExit {
                program: program.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Run `program args...` to completion, capturing both streams.
///
/// Returns `Err(Timeout)` if `limit` elapses first; the child is killed.
/// A non-zero exit is NOT an error here; callers decide.
pub async fn run_with_timeout<I, S>(
    program: &Path,
    args: I,
    working_dir: Option<&Path>,
    limit: Duration,
) -> Result<ToolOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.display().to_string();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    debug!("Running {:?}", command.as_std());

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program_name.clone(),
        source,
    })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProcessError::Spawn {
                program: program_name,
                source,
            });
        }
        Err(_) => {
            return Err(ProcessError::Timeout {
                program: program_name,
                after: limit,
            });
        }
    };

    Ok(ToolOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
