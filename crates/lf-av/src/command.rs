//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use lf_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Number of trailing stderr lines kept as engine diagnostics.
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8). For streaming runs this holds
    /// only the trailing diagnostic lines.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use lf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> lf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("/path/to/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path. No timeout is set.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time. On expiry the process is killed.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Set or clear the maximum execution time.
    pub fn timeout_opt(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn spawn(&self, stdout: Stdio) -> Result<tokio::process::Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Tool`] if spawning the process fails.
    /// - [`Error::Timeout`] if the process outlives its timeout.
    /// - [`Error::Engine`] if the process exits with a non-zero status; the
    ///   diagnostics carry its stderr.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();
        let child = self.spawn(Stdio::piped())?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                // The child future is dropped here and kill_on_drop reaps it.
                .map_err(|_| Error::timeout(program_name.clone(), limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool(program_name.clone(), format!("I/O error waiting for process: {e}")))?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::engine(
                program_name,
                format!("exited with {}", output.status),
                tool_output.stderr.trim(),
            ));
        }

        Ok(tool_output)
    }

    /// Execute the command, feeding every stderr line to `on_line` as it
    /// arrives.
    ///
    /// The run ends early when `cancel` fires (the child is killed and
    /// [`Error::Aborted`] returned) or when the timeout expires (the child is
    /// killed and [`Error::Timeout`] returned). Stdout is discarded.
    pub async fn execute_streaming<F>(
        &self,
        mut on_line: F,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>
    where
        F: FnMut(&str) + Send,
    {
        let program_name = self.program_name();
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let mut child = self.spawn(Stdio::null())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr not captured".into()))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
        let mut stderr_open = true;

        let deadline = async {
            match self.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!(tool = %program_name, "cancelled; killing child");
                    let _ = child.kill().await;
                    return Err(Error::Aborted);
                }
                _ = &mut deadline => {
                    let limit = self.timeout.unwrap_or_default();
                    tracing::warn!(tool = %program_name, ?limit, "timed out; killing child");
                    let _ = child.kill().await;
                    return Err(Error::timeout(program_name, limit));
                }
                line = lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        on_line(&line);
                        if tail.len() == DIAGNOSTIC_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        tracing::debug!(tool = %program_name, "stderr read failed: {e}");
                        stderr_open = false;
                    }
                },
                status = child.wait(), if !stderr_open => {
                    break status.map_err(|e| {
                        Error::tool(program_name.clone(), format!("I/O error waiting for process: {e}"))
                    })?;
                }
            }
        };

        let diagnostics = Vec::from(tail).join("\n");
        if !status.success() {
            return Err(Error::engine(
                program_name,
                format!("exited with {status}"),
                diagnostics,
            ));
        }

        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr: diagnostics,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn execute_echo() {
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tool");
    }

    #[tokio::test]
    async fn non_zero_exit_is_engine_error_with_stderr() {
        let err = sh("echo broken input >&2; exit 3").execute().await.unwrap_err();
        match err {
            Error::Engine { diagnostics, .. } => assert!(diagnostics.contains("broken input")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_fires() {
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[tokio::test]
    async fn streaming_delivers_lines_in_order() {
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        let out = sh("echo one >&2; echo two >&2; echo three >&2")
            .execute_streaming(|l| seen.push(l.to_string()), &cancel)
            .await
            .unwrap();
        assert_eq!(seen, vec!["one", "two", "three"]);
        assert!(out.stderr.ends_with("three"));
    }

    #[tokio::test]
    async fn streaming_failure_carries_tail() {
        let cancel = CancellationToken::new();
        let err = sh("echo 'Invalid data found' >&2; exit 1")
            .execute_streaming(|_| {}, &cancel)
            .await
            .unwrap_err();
        match err {
            Error::Engine { diagnostics, .. } => assert!(diagnostics.contains("Invalid data")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn streaming_cancel_kills_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .execute_streaming(|_| {}, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn streaming_already_cancelled_never_spawns() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute_streaming(|_| {}, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn streaming_timeout_kills_child() {
        let cancel = CancellationToken::new();
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute_streaming(|_| {}, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }
}
