use std::{ffi::OsStr, process::Stdio};

use tokio::process::Command;
use tracing::{debug, trace};

use crate::WorkerError;

/// Lines of child stderr kept in the error when a tool exits unsuccessfully.
const STDERR_TAIL: usize = 8;

pub(crate) fn command<I, S>(program: &str, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Runs the command to completion and returns its stdout.
///
/// A non-zero exit is an error carrying the tail of stderr.
pub(crate) async fn run_checked(program: &str, mut cmd: Command) -> Result<Vec<u8>, WorkerError> {
    trace!(target: "scribe.worker.proc", %program, "spawn");

    let output = cmd.output().await.map_err(|e| WorkerError::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL)..].join("\n");

        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        return Err(WorkerError::NonZeroExit {
            program: program.to_string(),
            status: if tail.is_empty() { status } else { format!("{status}: {tail}") },
        });
    }

    debug!(target: "scribe.worker.proc", %program, "exit success");
    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let out = run_checked("sh", command("sh", ["-c", "printf hello"]))
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr_tail() {
        let err = run_checked("sh", command("sh", ["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            WorkerError::NonZeroExit { status, .. } => {
                assert!(status.contains("exit code 3"), "{status}");
                assert!(status.contains("boom"), "{status}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run_checked(
            "scribe-no-such-binary",
            command("scribe-no-such-binary", Vec::<String>::new()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::Spawn { .. }));
    }
}
