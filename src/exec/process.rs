use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::CxError;
use crate::exec::{CommandRunner, ExecOutput, ExitOutcome};

pub const MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Runs real subprocesses via tokio.
///
/// - No shell interpolation in `run` (Command::new + args)
/// - Child is its own process group; the whole group is killed on deadline
/// - kill_on_drop(true) prevents zombie processes
/// - Each stream capped at MAX_OUTPUT_BYTES
/// - stdin is null so interactive CLIs cannot block waiting for input
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        deadline: Instant,
    ) -> Result<ExecOutput, CxError> {
        let start = Instant::now();

        let Some(timeout) = deadline.checked_duration_since(start).filter(|d| !d.is_zero()) else {
            return Ok(ExecOutput::timed_out(Duration::ZERO));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| CxError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

        // process_group(0) makes the child its own group leader (pgid == pid).
        let child_pid = child.id();

        let (Some(stdout_pipe), Some(stderr_pipe)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err(CxError::Spawn {
                program: program.to_string(),
                message: "stdout/stderr were not captured".to_string(),
            });
        };

        let read_future = async {
            // Readers run as separate tasks so a full stderr pipe cannot stall stdout.
            let mut stdout_handle = tokio::spawn(read_capped(stdout_pipe, "stdout"));
            let mut stderr_handle = tokio::spawn(read_capped(stderr_pipe, "stderr"));

            // If either stream hit the cap, the child may be blocked writing to
            // the full pipe. Kill the group to unblock the other reader.
            let (stdout_buf, stderr_buf) = tokio::select! {
                result = &mut stdout_handle => {
                    let buf = result.unwrap_or_default();
                    if buf.len() >= MAX_OUTPUT_BYTES {
                        kill_group(child_pid);
                    }
                    (buf, stderr_handle.await.unwrap_or_default())
                }
                result = &mut stderr_handle => {
                    let buf = result.unwrap_or_default();
                    if buf.len() >= MAX_OUTPUT_BYTES {
                        kill_group(child_pid);
                    }
                    (stdout_handle.await.unwrap_or_default(), buf)
                }
            };
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout_buf, stderr_buf, status))
        };

        let (stdout, stderr, status) = match tokio::time::timeout(timeout, read_future).await {
            Ok(result) => result.map_err(|e| CxError::Spawn {
                program: program.to_string(),
                message: format!("failed to read output: {e}"),
            })?,
            Err(_) => {
                // Timeout: kill the process group, not just the leader
                kill_group(child_pid);
                tracing::debug!(
                    program,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "process deadline exceeded"
                );
                return Ok(ExecOutput::timed_out(start.elapsed()));
            }
        };

        let stderr = String::from_utf8_lossy(&stderr).to_string();
        let stdout = String::from_utf8_lossy(&stdout).to_string();

        let status = if status.success() {
            ExitOutcome::Success
        } else {
            ExitOutcome::Failed {
                code: status.code(),
            }
        };

        if !stderr.is_empty() {
            tracing::debug!(program, stderr = %stderr, "process stderr output");
        }

        Ok(ExecOutput {
            stdout,
            stderr,
            status,
        })
    }
}

async fn read_capped<R>(pipe: R, stream: &'static str) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_OUTPUT_BYTES.min(64 * 1024));
    let mut capped = pipe.take(MAX_OUTPUT_BYTES as u64);
    if let Err(e) = capped.read_to_end(&mut buf).await {
        tracing::warn!(stream, "pipe read error: {e}");
    }
    buf
}

/// SIGKILL the whole process group. start_kill() only reaches the direct
/// child; grandchildren would survive holding the pipes open.
fn kill_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}
