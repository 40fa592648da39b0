pub mod process;
pub mod recording;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::CxError;

pub use process::ProcessRunner;
pub use recording::{Invocation, RecordingRunner};

/// Shell used for `run_shell`.
pub const SHELL: &str = "sh";

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    /// Non-zero exit. `code` is None when the process was killed by a signal.
    Failed { code: Option<i32> },
    /// Deadline reached; the process (group) was killed.
    TimedOut { after: Duration },
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("exit status 0"),
            Self::Failed { code: Some(code) } => write!(f, "exit status {code}"),
            Self::Failed { code: None } => f.write_str("terminated by signal"),
            Self::TimedOut { after } => {
                write!(f, "deadline exceeded after {}ms", after.as_millis())
            }
        }
    }
}

/// Captured result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitOutcome,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            status: ExitOutcome::Success,
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status: ExitOutcome::Failed { code: Some(code) },
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            status: ExitOutcome::TimedOut { after },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExitOutcome::Success
    }

    /// Most specific failure text available: trimmed stderr, or the outcome
    /// description when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.status.to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external programs with a deadline, capturing stdout and stderr.
///
/// Implementations return `Err` only when the invocation could not happen at
/// all (spawn failure, unexpected call in a test double). Non-zero exits and
/// deadline expiry are reported through [`ExecOutput::status`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        deadline: Instant,
    ) -> Result<ExecOutput, CxError>;

    /// Run `command` through `sh -c`.
    async fn run_shell(&self, command: &str, deadline: Instant) -> Result<ExecOutput, CxError> {
        let args = vec!["-c".to_string(), command.to_string()];
        self.run(SHELL, &args, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_prefers_trimmed_stderr() {
        let out = ExecOutput::failure(1, "  quota exceeded \n");
        assert_eq!(out.diagnostic(), "quota exceeded");
    }

    #[test]
    fn diagnostic_falls_back_to_outcome() {
        let out = ExecOutput::failure(3, "   ");
        assert_eq!(out.diagnostic(), "exit status 3");
    }
}
