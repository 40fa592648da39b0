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

/// Placeholder replaced with the rendered prompt.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Provider that runs a user-supplied shell template, e.g.
/// `ollama run llama3 "{prompt}"`. The template is the whole interface: no
/// flags or model are injected, and the prompt is substituted verbatim.
pub struct ShellProvider {
    template: String,
    timeout_secs: u64,
    runner: Arc<dyn CommandRunner>,
}

impl ShellProvider {
    pub const NAME: &'static str = "custom";

    /// Fails when the template is blank, so a misconfiguration surfaces
    /// before the first generate call.
    pub fn new(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Result<Self, CxError> {
        if settings.command.trim().is_empty() {
            return Err(CxError::config(
                "command",
                "not set (required for the custom provider)",
            ));
        }
        Ok(Self {
            template: settings.command.clone(),
            timeout_secs: settings.timeout_secs,
            runner,
        })
    }

    /// Shell string for `prompt`.
    pub fn render(&self, prompt: &str) -> String {
        self.template.replace(PROMPT_PLACEHOLDER, prompt)
    }

    async fn invoke(&self, prompt: &str) -> Result<String, CxError> {
        let command = self.render(prompt);
        tracing::debug!(prompt_len = prompt.len(), "invoking custom command");

        let output = self
            .runner
            .run_shell(&command, deadline_after(self.timeout_secs))
            .await
            .map_err(|e| attach_backend(Self::NAME, e))?;
        expect_success(Self::NAME, self.timeout_secs, output)
    }
}

#[async_trait]
impl Provider for ShellProvider {
    fn name(&self) -> &str {
        Self::NAME
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
impl DetailProvider for ShellProvider {
    async fn generate_detail(&self, req: &GenerateRequest) -> Result<Detail, CxError> {
        let stdout = self.invoke(&build_detail_prompt(req)).await?;
        Ok(parse_detail_output(&stdout))
    }
}
