//! Process invoker: run one external command to completion.
//!
//! Every engine adapter, the splitter and the cropper go through [`invoke`].
//! It never returns an error: a spawn failure, a non-zero exit or a timeout
//! is recorded in [`InvocationOutcome::error`] so the caller can keep
//! collecting the results of the other invocations of its stage.
//!
//! `tokio::process` keeps the runtime free while the child runs, which is
//! what lets a stage launch all of its invocations at once and await them
//! together on a single task.

use crate::config::Executable;
use crate::error::TaskError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Working directory of the child; inherited when `None`.
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    /// Start from an executable, including its leading arguments.
    pub fn new(exe: &Executable) -> Self {
        Self {
            program: exe.program.clone(),
            args: exe.args.iter().map(OsString::from).collect(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Run the child inside `dir`.
    ///
    /// A program given as a relative path is anchored to the caller's
    /// working directory first, so it still resolves from inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        if Path::new(&self.program).components().count() > 1 {
            self.program = absolute(Path::new(&self.program))
                .to_string_lossy()
                .into_owned();
        }
        self.current_dir = Some(dir.into());
        self
    }

    /// Human-readable command line, for events and logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for a in &self.args {
            line.push(' ');
            line.push_str(&a.to_string_lossy());
        }
        line
    }
}

/// `path` anchored to the current working directory, or unchanged if
/// that cannot be determined.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// What happened when an [`Invocation`] ran.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub command: String,
    pub elapsed_ms: u64,
    /// Everything the process wrote to stderr, trimmed.
    pub stderr: String,
    pub error: Option<TaskError>,
}

impl InvocationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Run `invocation` to completion.
pub async fn invoke(invocation: &Invocation, timeout: Option<Duration>) -> InvocationOutcome {
    run(invocation, None, timeout).await
}

/// Run `invocation`, writing `input` to its stdin and then closing it.
pub async fn invoke_with_input(
    invocation: &Invocation,
    input: String,
    timeout: Option<Duration>,
) -> InvocationOutcome {
    run(invocation, Some(input), timeout).await
}

async fn run(
    invocation: &Invocation,
    input: Option<String>,
    timeout: Option<Duration>,
) -> InvocationOutcome {
    let start = Instant::now();
    let command = invocation.command_line();
    debug!("Spawning: {}", command);

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = invocation.current_dir {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return finish(
                command.clone(),
                start,
                String::new(),
                Some(TaskError::SpawnFailed {
                    command,
                    detail: e.to_string(),
                }),
            )
        }
    };

    let stdin = child.stdin.take();
    let run_to_end = async move {
        if let (Some(mut pipe), Some(text)) = (stdin, input) {
            // A child that exits without draining stdin surfaces through
            // its exit status; the broken pipe itself is not interesting.
            let _ = pipe.write_all(text.as_bytes()).await;
            drop(pipe);
        }
        child.wait_with_output().await
    };

    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run_to_end).await {
            Ok(result) => result,
            Err(_) => {
                // The child was dropped with the future; kill_on_drop reaps it.
                return finish(
                    command.clone(),
                    start,
                    String::new(),
                    Some(TaskError::TimedOut {
                        command,
                        after_ms: limit.as_millis() as u64,
                    }),
                );
            }
        },
        None => run_to_end.await,
    };

    match waited {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let error = (!output.status.success()).then(|| TaskError::ExitStatus {
                command: command.clone(),
                status: output.status.to_string(),
                stderr: stderr.clone(),
            });
            finish(command, start, stderr, error)
        }
        Err(e) => finish(
            command.clone(),
            start,
            String::new(),
            Some(TaskError::SpawnFailed {
                command,
                detail: e.to_string(),
            }),
        ),
    }
}

fn finish(
    command: String,
    start: Instant,
    stderr: String,
    error: Option<TaskError>,
) -> InvocationOutcome {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &error {
        None => debug!("Finished in {}ms: {}", elapsed_ms, command),
        Some(e) => debug!("Failed after {}ms: {}", elapsed_ms, e),
    }
    InvocationOutcome {
        command,
        elapsed_ms,
        stderr,
        error,
    }
}
