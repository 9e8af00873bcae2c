//! External process execution helpers.
//!
//! Every spawned process gets its stdout and stderr drained on two
//! independent reader threads; a full OS pipe buffer would otherwise block
//! the process mid-run. Waiting is done with `try_wait` polling so callers
//! stay responsive to cancellation.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::cancel::CancelToken;
use crate::error::{CoreError, Result};

/// Outcome of waiting on a child process under a cancellation token.
pub enum WaitOutcome {
    Finished(ExitStatus),
    Cancelled,
}

/// A spawned child whose output streams are being drained concurrently.
pub struct DrainedChild {
    pub child: Child,
    stdout: JoinHandle<Vec<String>>,
    stderr: JoinHandle<Vec<String>>,
}

impl DrainedChild {
    /// Joins the reader threads and returns the last `max_lines` stderr
    /// lines, for error reporting. Call only after the child has exited.
    pub fn stderr_tail(self, max_lines: usize) -> String {
        let _ = self.stdout.join();
        let lines = self.stderr.join().unwrap_or_default();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("; ")
    }
}

/// Spawns a command with both output streams piped and drained.
pub fn spawn_drained(cmd: &mut Command) -> Result<DrainedChild> {
    debug!("spawning: {cmd:?}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            error!("failed to spawn {:?}: {e}", cmd.get_program());
            CoreError::CommandExecution(format!("failed to spawn {:?}: {e}", cmd.get_program()))
        })?;

    let stdout = BufReader::new(child.stdout.take().unwrap());
    let stderr = BufReader::new(child.stderr.take().unwrap());

    let stdout_handle = thread::spawn(move || {
        let mut lines = Vec::new();
        for line in stdout.lines().map_while(|l| l.ok()) {
            debug!("STDOUT: {line}");
            lines.push(line);
        }
        lines
    });

    let stderr_handle = thread::spawn(move || {
        let mut lines = Vec::new();
        for line in stderr.lines().map_while(|l| l.ok()) {
            debug!("STDERR: {line}");
            lines.push(line);
        }
        lines
    });

    Ok(DrainedChild {
        child,
        stdout: stdout_handle,
        stderr: stderr_handle,
    })
}

/// Waits for a child to exit, re-checking the token between short polls.
/// On cancellation the child is killed and reaped before returning.
pub fn wait_with_cancel(
    child: &mut Child,
    token: &CancelToken,
    poll_interval: Duration,
) -> std::io::Result<WaitOutcome> {
    loop {
        if token.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(WaitOutcome::Cancelled);
        }
        match child.try_wait()? {
            Some(status) => return Ok(WaitOutcome::Finished(status)),
            None => thread::sleep(poll_interval),
        }
    }
}

/// Executes a command to completion and returns its output. Non-zero exit is
/// an error carrying the captured stderr.
pub fn run_command(cmd: &mut Command) -> Result<Output> {
    debug!("running: {cmd:?}");

    let output = cmd.output().map_err(|e| {
        error!("failed to execute {:?}: {e}", cmd.get_program());
        CoreError::CommandExecution(format!("failed to execute {:?}: {e}", cmd.get_program()))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            "command exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
        return Err(CoreError::CommandExecution(format!(
            "command exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_run_command_echo() {
        let mut cmd = Command::new("echo");
        cmd.arg("test");
        let output = run_command(&mut cmd).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "test");
    }

    #[test]
    fn test_run_command_nonzero_exit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = run_command(&mut cmd).unwrap_err();
        let message = err.to_string();
        assert!(message.contains('3'), "unexpected error: {message}");
        assert!(message.contains("boom"), "unexpected error: {message}");
    }

    #[test]
    fn test_drained_child_stderr_tail() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo one >&2; echo two >&2; echo three >&2"]);
        let mut drained = spawn_drained(&mut cmd).unwrap();
        drained.child.wait().unwrap();
        assert_eq!(drained.stderr_tail(2), "two; three");
    }

    #[test]
    fn test_wait_with_cancel_kills_child() {
        let token = CancelToken::new();
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let mut drained = spawn_drained(&mut cmd).unwrap();

        token.cancel();
        let start = Instant::now();
        let outcome = wait_with_cancel(&mut drained.child, &token, Duration::from_millis(50));
        assert!(matches!(outcome, Ok(WaitOutcome::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_with_cancel_reports_exit_status() {
        let token = CancelToken::new();
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 0"]);
        let mut drained = spawn_drained(&mut cmd).unwrap();

        match wait_with_cancel(&mut drained.child, &token, Duration::from_millis(20)) {
            Ok(WaitOutcome::Finished(status)) => assert!(status.success()),
            _ => panic!("expected process exit"),
        }
    }
}
