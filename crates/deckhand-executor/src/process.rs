//! Bounded invocation of external command-line tools.

use bytes::Bytes;
use deckhand_core::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

/// Default upper bound for a single tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Number of trailing stderr lines kept in failure messages.
const STDERR_TAIL: usize = 20;

/// Captured output of a successful invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Bytes,
    pub stderr: String,
}

/// An external program run with a timeout.
#[derive(Debug, Clone)]
pub struct Tool {
    program: String,
    timeout: Duration,
}

impl Tool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Use the program named by env var `var`, or `default` if it is unset.
    pub fn from_env(var: &str, default: &str, timeout: Duration) -> Self {
        let program = std::env::var(var).unwrap_or_else(|_| default.to_string());
        Self::new(program, timeout)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the program to completion.
    ///
    /// A non-zero exit is reported as [`Error::ToolFailed`] carrying the tail
    /// of stderr. On timeout the child is killed.
    pub async fn run(
        &self,
        args: &[String],
        dir: Option<&Path>,
        stdin: Option<Bytes>,
    ) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        debug!(tool = %self.program, ?args, dir = ?dir, "Running tool");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound(self.program.clone())
            } else {
                Error::Io(e)
            }
        })?;

        // Feed stdin concurrently so a large input cannot deadlock against a full stdout pipe.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
                pipe.write_all(&input).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                error!(tool = %self.program, timeout = ?self.timeout, "Tool timed out");
                return Err(Error::Timeout {
                    tool: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                debug!(tool = %self.program, error = %e, "Tool closed stdin early");
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::ToolFailed {
                tool: self.program.clone(),
                message: format!("exit {}: {}", code, tail(&stderr, STDERR_TAIL)),
            });
        }

        Ok(ToolOutput {
            stdout: Bytes::from(output.stdout),
            stderr,
        })
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
