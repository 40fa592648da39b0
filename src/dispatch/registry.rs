use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Settings;
use crate::dispatch::Provider;
use crate::dispatch::cli::{CliBackend, CliProvider};
use crate::dispatch::http::HostedApiProvider;
use crate::dispatch::shell::ShellProvider;
use crate::error::CxError;
use crate::exec::CommandRunner;

/// Closed set of backend selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    Copilot,
    Claude,
    Codex,
    Api,
    Custom,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        Self::Gemini,
        Self::Copilot,
        Self::Claude,
        Self::Codex,
        Self::Api,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Copilot => "copilot",
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Api => "api",
            Self::Custom => "custom",
        }
    }

    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(BackendKind::as_str).collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| CxError::UnknownBackend {
                value: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// Build the provider selected by `settings.provider`.
///
/// Every configuration problem (unknown selector, blank custom template, bad
/// API base URL) is reported here, never from a later generate call.
/// `runner` is shared by the command-based backends; the HTTP backend ignores it.
pub fn create_provider(
    settings: &Settings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn Provider>, CxError> {
    let kind: BackendKind = settings.provider.parse()?;
    create_provider_for(kind, settings, runner)
}

pub fn create_provider_for(
    kind: BackendKind,
    settings: &Settings,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn Provider>, CxError> {
    let provider: Box<dyn Provider> = match kind {
        BackendKind::Api => Box::new(HostedApiProvider::new(settings)?),
        BackendKind::Custom => Box::new(ShellProvider::new(settings, runner)?),
        BackendKind::Gemini => Box::new(CliProvider::new(CliBackend::Gemini, settings, runner)),
        BackendKind::Copilot => Box::new(CliProvider::new(CliBackend::Copilot, settings, runner)),
        BackendKind::Claude => Box::new(CliProvider::new(CliBackend::Claude, settings, runner)),
        BackendKind::Codex => Box::new(CliProvider::new(CliBackend::Codex, settings, runner)),
    };
    tracing::debug!(provider = provider.name(), "provider constructed");
    Ok(provider)
}
