//! Install script execution.
//!
//! The script is written to disk, run through `/bin/sh` with the inherited
//! environment plus a per-distribution overlay, and removed afterwards.
//! Stdout goes to the caller's sink; stderr goes to tracing.
//! The script leads its own process group so cancellation reaches every
//! process it started.

mod process_group;
mod script;
mod stderr;

pub use script::InitScript;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use airgap_driver_shared::constants;
use airgap_driver_shared::errors::{DriverError, DriverResult};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use process_group::ProcessGroup;
use script::ScriptFile;

/// Runs one install script to completion.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    script: InitScript,
    script_path: PathBuf,
    env_overlay: Vec<(String, String)>,
}

impl Bootstrapper {
    /// # Arguments
    /// * `script` - Payload to execute
    /// * `script_path` - Where the payload is materialized for the run
    /// * `env_overlay` - Variables added on top of the inherited environment
    pub fn new(
        script: InitScript,
        script_path: impl Into<PathBuf>,
        env_overlay: Vec<(String, String)>,
    ) -> Self {
        Self {
            script,
            script_path: script_path.into(),
            env_overlay,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn env_overlay(&self) -> &[(String, String)] {
        &self.env_overlay
    }

    /// Run the script, streaming its stdout into `sink`.
    ///
    /// Blocks until the script exits. There is no built-in timeout: the
    /// caller bounds the run through `cancel`, which kills the script's whole
    /// process group. Dropping the returned future does the same.
    ///
    /// # Returns
    /// * `Ok(())` - The script exited with status 0
    /// * `Err(DriverError::Exec)` - Launch failure or non-zero exit, with the stderr tail
    /// * `Err(DriverError::Cancelled)` - `cancel` fired; the process has been reaped
    pub async fn run<W>(&self, sink: &mut W, cancel: &CancellationToken) -> DriverResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(DriverError::cancelled("bootstrap"));
        }

        let script_file = ScriptFile::materialize(&self.script, &self.script_path)?;
        let path = script_file.path();

        tracing::info!(
            script = %path.display(),
            overlay = self.env_overlay.len(),
            "Running install script"
        );

        let mut child = Command::new(constants::script::SHELL)
            .arg(path)
            .envs(self.env_overlay.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::exec(
                    path,
                    format!("failed to launch {}: {e}", constants::script::SHELL),
                )
            })?;
        let mut group = ProcessGroup::led_by(&child);

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::exec(path, "stdout was not captured"))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| DriverError::exec(path, "stderr was not captured"))?;
        let stderr_task = tokio::spawn(stderr::drain(child_stderr));

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = stream_until_exit(&mut child, &mut stdout, sink) => Some(result),
        };

        let status = match outcome {
            None => {
                tracing::warn!(script = %path.display(), "Install script cancelled, killing");
                group.kill();
                if let Err(e) = child.wait().await {
                    tracing::warn!(error = %e, "Failed to reap install script");
                }
                stderr_task.abort();
                return Err(DriverError::cancelled("bootstrap"));
            }
            Some(Err(e)) => {
                group.kill();
                let _ = child.wait().await;
                stderr_task.abort();
                return Err(DriverError::exec(
                    path,
                    format!("failed to stream output: {e}"),
                ));
            }
            Some(Ok(status)) => status,
        };
        group.release();

        let tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            tracing::warn!(script = %path.display(), status = %status, "Install script failed");
            return Err(DriverError::exec(path, describe_failure(status, &tail)));
        }

        tracing::info!(script = %path.display(), "Install script completed");
        Ok(())
    }
}

/// Copy stdout into the sink until EOF, then reap the process.
async fn stream_until_exit<W>(
    child: &mut Child,
    stdout: &mut ChildStdout,
    sink: &mut W,
) -> std::io::Result<ExitStatus>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = tokio::io::copy(stdout, sink).await?;
    sink.flush().await?;
    tracing::debug!(bytes = copied, "Install script stdout closed");
    child.wait().await
}

fn describe_failure(status: ExitStatus, tail: &[String]) -> String {
    if tail.is_empty() {
        format!("exited with {status}")
    } else {
        format!("exited with {status}; stderr: {}", tail.join("\n"))
    }
}
