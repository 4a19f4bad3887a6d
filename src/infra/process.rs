//! External process execution
//!
//! Spawns a build command with an explicit environment and streams its
//! stdout and stderr line by line to a callback while it runs. The call
//! resolves only once the process has exited, or once the cancellation
//! token fires, in which case the child is killed.
//!
//! Only the direct child is killed on cancellation. Processes it started
//! itself keep running until they exit on their own; cancellation does not
//! wait for them or for the output pipes they may still hold.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;

/// Which stream a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Everything needed to start one process
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    /// Complete environment; nothing is inherited
    pub env: &'a BTreeMap<String, String>,
    pub cwd: &'a Path,
}

/// Run a process to completion, handing each output line to `on_line`.
///
/// Lines are decoded lossily and passed without their trailing newline.
pub async fn run_streaming<F>(
    invocation: Invocation<'_>,
    cancel: &CancellationToken,
    mut on_line: F,
) -> Result<(), ProcessError>
where
    F: FnMut(OutputStream, &str),
{
    let program = invocation.program.to_string();
    let io_error = |e: std::io::Error| ProcessError::Io {
        program: program.clone(),
        error: e.to_string(),
    };

    let mut child = Command::new(invocation.program)
        .args(invocation.args)
        .env_clear()
        .envs(invocation.env)
        .current_dir(invocation.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ProcessError::Launch {
            program: program.clone(),
            error: e.to_string(),
        })?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(ProcessError::Io {
            program,
            error: "output pipes were not captured".to_string(),
        });
    };
    let mut stdout = BufReader::new(stdout).split(b'\n');
    let mut stderr = BufReader::new(stderr).split(b'\n');
    let mut stdout_open = true;
    let mut stderr_open = true;

    let status = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break None,

            segment = stdout.next_segment(), if stdout_open => match segment.map_err(io_error)? {
                Some(bytes) => on_line(OutputStream::Stdout, &decode_line(&bytes)),
                None => stdout_open = false,
            },

            segment = stderr.next_segment(), if stderr_open => match segment.map_err(io_error)? {
                Some(bytes) => on_line(OutputStream::Stderr, &decode_line(&bytes)),
                None => stderr_open = false,
            },

            status = child.wait(), if !stdout_open && !stderr_open => break Some(status.map_err(io_error)?),
        }
    };

    match status {
        None => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(ProcessError::Cancelled { program })
        }
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(ProcessError::Exit {
            program,
            code: status.code(),
        }),
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
