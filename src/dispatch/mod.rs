pub mod cli;
pub mod http;
pub mod registry;
pub mod shell;

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::CxError;
use crate::exec::{ExecOutput, ExitOutcome};
use crate::parsers::Detail;

/// Input for one generation call, shared by every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Staged diff. Truncated by the prompt builder, never here.
    pub diff: String,
    /// `git diff --stat` style summary of changed files.
    pub file_summary: String,
    pub commit_type: Option<String>,
    pub scope: Option<String>,
    /// Chosen subject; only meaningful for the detail phase.
    pub subject: Option<String>,
    /// Upper bound on returned candidates.
    pub candidate_count: usize,
}

impl GenerateRequest {
    pub fn new(diff: impl Into<String>, candidate_count: usize) -> Self {
        Self {
            diff: diff.into(),
            candidate_count,
            ..Default::default()
        }
    }

    pub fn with_file_summary(mut self, summary: impl Into<String>) -> Self {
        self.file_summary = summary.into();
        self
    }

    pub fn with_commit_type(mut self, commit_type: impl Into<String>) -> Self {
        self.commit_type = Some(commit_type.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn commit_type(&self) -> Option<&str> {
        non_blank(&self.commit_type)
    }

    pub fn scope(&self) -> Option<&str> {
        non_blank(&self.scope)
    }

    pub fn subject(&self) -> Option<&str> {
        non_blank(&self.subject)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A text-generation backend.
///
/// Providers capture their settings at construction and hold no per-call
/// state, so a shared instance may serve concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend identifier, e.g. `"gemini"` or `"api"`.
    fn name(&self) -> &str;

    /// Generate up to `req.candidate_count` subject lines.
    async fn generate(&self, req: &GenerateRequest) -> Result<Vec<String>, CxError>;

    /// Detail (body/footer) capability, if this backend has it.
    fn as_detail(&self) -> Option<&dyn DetailProvider> {
        None
    }

    fn supports_detail(&self) -> bool {
        self.as_detail().is_some()
    }
}

/// Second-phase capability: body and footer for a chosen subject.
#[async_trait]
pub trait DetailProvider: Send + Sync {
    async fn generate_detail(&self, req: &GenerateRequest) -> Result<Detail, CxError>;
}

/// Stand-in deadline when the configured timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Per-call deadline from configured timeout seconds. Saturates instead of
/// overflowing for absurdly large timeouts.
pub fn deadline_after(timeout_secs: u64) -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_secs(timeout_secs))
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Turn a finished invocation into its stdout, or the backend's error.
/// A timed-out invocation never yields partial output.
pub(crate) fn expect_success(
    backend: &str,
    timeout_secs: u64,
    output: ExecOutput,
) -> Result<String, CxError> {
    match output.status {
        ExitOutcome::Success => Ok(output.stdout),
        ExitOutcome::TimedOut { .. } => Err(CxError::Timeout {
            backend: backend.to_string(),
            secs: timeout_secs,
        }),
        ExitOutcome::Failed { .. } => Err(CxError::invocation(backend, output.diagnostic())),
    }
}

/// Re-attribute a runner spawn failure to the backend that asked for it.
pub(crate) fn attach_backend(backend: &str, err: CxError) -> CxError {
    match err {
        CxError::Spawn { program, message } => {
            CxError::invocation(backend, format!("failed to start {program}: {message}"))
        }
        other => other,
    }
}
