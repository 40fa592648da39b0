use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::CxError;
use crate::exec::{CommandRunner, ExecOutput};

/// One recorded call to a [`CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invocation {
    Program { name: String, args: Vec<String> },
    Shell(String),
}

impl Invocation {
    pub fn program<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Program {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program { name, args } => write!(f, "{name} {args:?}"),
            Self::Shell(command) => write!(f, "sh -c {command:?}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Stub {
    Output(ExecOutput),
    SpawnError(String),
}

/// Deterministic [`CommandRunner`] for tests.
///
/// Records every invocation and answers from pre-registered stubs keyed by the
/// exact invocation. In strict mode an unregistered call is an error, so every
/// call a test expects has to be spelled out.
#[derive(Default)]
pub struct RecordingRunner {
    stubs: HashMap<Invocation, Stub>,
    calls: Mutex<Vec<Invocation>>,
    strict: bool,
}

impl RecordingRunner {
    /// Runner that fails on any unregistered invocation.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Runner that answers unregistered invocations with empty successful output.
    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, invocation: Invocation, output: ExecOutput) -> Self {
        self.stubs.insert(invocation, Stub::Output(output));
        self
    }

    pub fn with_spawn_error(mut self, invocation: Invocation, message: impl Into<String>) -> Self {
        self.stubs.insert(invocation, Stub::SpawnError(message.into()));
        self
    }

    /// Snapshot of recorded invocations, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn respond(&self, invocation: Invocation) -> Result<ExecOutput, CxError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(invocation.clone());

        match self.stubs.get(&invocation) {
            Some(Stub::Output(output)) => Ok(output.clone()),
            Some(Stub::SpawnError(message)) => Err(CxError::Spawn {
                program: match &invocation {
                    Invocation::Program { name, .. } => name.clone(),
                    Invocation::Shell(_) => crate::exec::SHELL.to_string(),
                },
                message: message.clone(),
            }),
            None if self.strict => Err(CxError::UnexpectedInvocation(invocation.to_string())),
            None => Ok(ExecOutput::success("")),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _deadline: Instant,
    ) -> Result<ExecOutput, CxError> {
        self.respond(Invocation::program(program, args.iter().cloned()))
    }

    async fn run_shell(&self, command: &str, _deadline: Instant) -> Result<ExecOutput, CxError> {
        self.respond(Invocation::shell(command))
    }
}
