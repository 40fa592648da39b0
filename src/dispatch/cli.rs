use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::dispatch::{
    DetailProvider, GenerateRequest, Provider, attach_backend, deadline_after, expect_success,
};
use crate::error::CxError;
use crate::exec::CommandRunner;
use crate::parsers::{Detail, parse_candidates, parse_detail_output};
use crate::prompt::{build_detail_prompt, build_subject_prompt};

/// External generator CLIs that take the prompt as an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliBackend {
    Gemini,
    Copilot,
    Claude,
    Codex,
}

impl CliBackend {
    pub fn executable(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Copilot => "copilot",
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }

    /// Flag spelling for selecting a model; differs per CLI.
    pub fn model_flag(&self) -> &'static str {
        match self {
            Self::Gemini => "-m",
            Self::Copilot | Self::Claude | Self::Codex => "--model",
        }
    }

    /// Full argument list for one invocation.
    pub fn args(&self, prompt: &str, model: Option<&str>) -> Vec<String> {
        let mut args = match self {
            Self::Codex => vec!["exec".to_string(), prompt.to_string()],
            Self::Gemini | Self::Copilot | Self::Claude => {
                vec!["-p".to_string(), prompt.to_string()]
            }
        };
        if let Some(model) = model {
            args.push(self.model_flag().to_string());
            args.push(model.to_string());
        }
        args
    }
}

impl fmt::Display for CliBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

/// Provider backed by one of the [`CliBackend`] programs.
pub struct CliProvider {
    backend: CliBackend,
    model: Option<String>,
    timeout_secs: u64,
    runner: Arc<dyn CommandRunner>,
}

impl CliProvider {
    pub fn new(backend: CliBackend, settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        let model = Some(settings.model.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        Self {
            backend,
            model,
            timeout_secs: settings.timeout_secs,
            runner,
        }
    }

    async fn invoke(&self, prompt: &str) -> Result<String, CxError> {
        let program = self.backend.executable();
        let args = self.backend.args(prompt, self.model.as_deref());
        tracing::debug!(program, prompt_len = prompt.len(), "invoking generator CLI");

        let output = self
            .runner
            .run(program, &args, deadline_after(self.timeout_secs))
            .await
            .map_err(|e| attach_backend(program, e))?;
        expect_success(program, self.timeout_secs, output)
    }
}

#[async_trait]
impl Provider for CliProvider {
    fn name(&self) -> &str {
        self.backend.executable()
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Vec<String>, CxError> {
        let stdout = self.invoke(&build_subject_prompt(req)).await?;
        Ok(parse_candidates(&stdout, req.candidate_count))
    }

    fn as_detail(&self) -> Option<&dyn DetailProvider> {
        Some(self)
    }
}

#[async_trait]
impl DetailProvider for CliProvider {
    async fn generate_detail(&self, req: &GenerateRequest) -> Result<Detail, CxError> {
        let stdout = self.invoke(&build_detail_prompt(req)).await?;
        Ok(parse_detail_output(&stdout))
    }
}
