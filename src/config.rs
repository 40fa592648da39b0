use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::dispatch::deadline_after;
use crate::dispatch::http::endpoint_url;
use crate::dispatch::registry::BackendKind;
use crate::error::CxError;
use crate::exec::CommandRunner;

/// Looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".git-cx.toml";

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_CANDIDATES: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_SUBJECT_LENGTH: usize = 100;

/// Upper bound for the per-call timeout (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Deadline for each `git config` lookup.
const GIT_CONFIG_TIMEOUT_SECS: u64 = 5;

/// Single-valued `git config` keys read by [`GitConfig::read`].
pub const GIT_CONFIG_KEYS: &[&str] = &[
    "cx.provider",
    "cx.model",
    "cx.candidates",
    "cx.timeout",
    "cx.command",
    "cx.apiBaseUrl",
    "cx.api.baseUrl",
    "cx.apiKey",
    "cx.api.key",
    "cx.commit.useEmoji",
    "cx.commit.maxSubjectLength",
];

/// Multi-valued key; every occurrence is one allowed scope.
pub const GIT_CONFIG_SCOPES_KEY: &str = "cx.commit.scopes";

/// Hosted-API connection settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub key: String,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("key", &if self.key.is_empty() { "" } else { "[REDACTED]" })
            .finish()
    }
}

/// Commit formatting preferences. Carried for the front end; the generation
/// core does not apply them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSettings {
    pub use_emoji: bool,
    pub max_subject_length: usize,
    pub scopes: Vec<String>,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            use_emoji: false,
            max_subject_length: DEFAULT_MAX_SUBJECT_LENGTH,
            scopes: Vec::new(),
        }
    }
}

/// Resolved generation settings. Built once at startup; providers copy what
/// they need at construction and never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Backend selector, parsed by the provider factory.
    pub provider: String,
    pub model: String,
    pub candidates: usize,
    pub timeout_secs: u64,
    /// Shell template for the custom provider; `{prompt}` is substituted.
    pub command: String,
    pub api: ApiSettings,
    pub commit: CommitSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            candidates: DEFAULT_CANDIDATES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            command: String::new(),
            api: ApiSettings::default(),
            commit: CommitSettings::default(),
        }
    }
}

/// Command-line overrides; `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub candidates: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub command: Option<String>,
    pub api_base_url: Option<String>,
}

/// `cx.*` values from `git config`, captured once through a [`CommandRunner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitConfig {
    values: HashMap<String, String>,
    scopes: Vec<String>,
}

impl GitConfig {
    /// Query every known key. Unset keys, a missing `git` binary and lookup
    /// failures all read as "not configured".
    pub async fn read(runner: &dyn CommandRunner) -> Self {
        let mut config = Self::default();

        for key in GIT_CONFIG_KEYS {
            if let Some(value) = git_config(runner, "--get", key).await {
                let value = value.trim();
                if !value.is_empty() {
                    config.values.insert(key.to_string(), value.to_string());
                }
            }
        }

        if let Some(output) = git_config(runner, "--get-all", GIT_CONFIG_SCOPES_KEY).await {
            config.scopes = output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
        }

        tracing::debug!(keys = config.values.len(), "git config read");
        config
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

async fn git_config(runner: &dyn CommandRunner, mode: &str, key: &str) -> Option<String> {
    let args = vec!["config".to_string(), mode.to_string(), key.to_string()];
    match runner.run("git", &args, deadline_after(GIT_CONFIG_TIMEOUT_SECS)).await {
        Ok(output) if output.is_success() => Some(output.stdout),
        // git exits 1 for an unset key
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(key, "git config lookup failed: {e}");
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    provider: Option<String>,
    model: Option<String>,
    candidates: Option<usize>,
    timeout: Option<u64>,
    command: Option<String>,
    api_base_url: Option<String>,
    api_key: Option<String>,
    api: Option<FileApiConfig>,
    commit: Option<FileCommitConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileApiConfig {
    base_url: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCommitConfig {
    use_emoji: Option<bool>,
    max_subject_length: Option<usize>,
    scopes: Option<Vec<String>>,
}

impl Settings {
    /// Resolve settings: defaults, then `git config`, then the TOML file,
    /// then environment, then `overrides`. The result is validated.
    ///
    /// With `path == None`, `.git-cx.toml` in the working directory is used
    /// if it exists. An explicit path that cannot be read is an error.
    pub fn load(
        git: &GitConfig,
        path: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<Self, CxError> {
        let mut settings = Settings::default();
        settings.apply_git_config(git);

        match path {
            Some(path) => settings.apply_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    settings.apply_file(default_path)?;
                }
            }
        }

        settings.apply_env(|key| env::var(key).ok());
        settings.apply_overrides(overrides);
        settings.validate()?;

        tracing::debug!(provider = %settings.provider, model = %settings.model, "settings loaded");
        Ok(settings)
    }

    /// Base layer. `cx.apiBaseUrl` / `cx.apiKey` win over the dotted
    /// `cx.api.*` spellings.
    pub fn apply_git_config(&mut self, git: &GitConfig) {
        if let Some(v) = git.get("cx.provider") {
            self.provider = v.to_string();
        }
        if let Some(v) = git.get("cx.model") {
            self.model = v.to_string();
        }
        if let Some(v) = git.get("cx.candidates") {
            parse_setting(&mut self.candidates, "cx.candidates", v);
        }
        if let Some(v) = git.get("cx.timeout") {
            parse_setting(&mut self.timeout_secs, "cx.timeout", v);
        }
        if let Some(v) = git.get("cx.command") {
            self.command = v.to_string();
        }
        if let Some(v) = git.get("cx.apiBaseUrl").or_else(|| git.get("cx.api.baseUrl")) {
            self.api.base_url = v.to_string();
        }
        if let Some(v) = git.get("cx.apiKey").or_else(|| git.get("cx.api.key")) {
            self.api.key = v.to_string();
        }
        if let Some(v) = git.get("cx.commit.useEmoji") {
            self.commit.use_emoji = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = git.get("cx.commit.maxSubjectLength") {
            parse_setting(&mut self.commit.max_subject_length, "cx.commit.maxSubjectLength", v);
        }
        if !git.scopes().is_empty() {
            self.commit.scopes = git.scopes().to_vec();
        }
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), CxError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CxError::config("config", format!("failed to read {}: {e}", path.display()))
        })?;
        self.apply_toml(&text).map_err(|e| match e {
            CxError::Config { setting, message } => CxError::Config {
                setting,
                message: format!("{message} (in {})", path.display()),
            },
            other => other,
        })
    }

    /// Merge a TOML document on top of the current values. Keys present in
    /// the document win; unknown keys are rejected. `[api]` wins over the
    /// flat `api_base_url` / `api_key` spellings.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), CxError> {
        let file: FileConfig = toml::from_str(text)
            .map_err(|e| CxError::config("config", format!("failed to parse: {e}")))?;

        if let Some(v) = file.provider {
            self.provider = v;
        }
        if let Some(v) = file.model {
            self.model = v;
        }
        if let Some(v) = file.candidates {
            self.candidates = v;
        }
        if let Some(v) = file.timeout {
            self.timeout_secs = v;
        }
        if let Some(v) = file.command {
            self.command = v;
        }
        if let Some(v) = file.api_base_url {
            self.api.base_url = v;
        }
        if let Some(v) = file.api_key {
            self.api.key = v;
        }
        if let Some(api) = file.api {
            if let Some(v) = api.base_url {
                self.api.base_url = v;
            }
            if let Some(v) = api.key {
                self.api.key = v;
            }
        }
        if let Some(commit) = file.commit {
            if let Some(v) = commit.use_emoji {
                self.commit.use_emoji = v;
            }
            if let Some(v) = commit.max_subject_length {
                self.commit.max_subject_length = v;
            }
            if let Some(v) = commit.scopes {
                self.commit.scopes = v;
            }
        }
        Ok(())
    }

    /// Environment layer. `lookup` is `std::env::var` in production.
    ///
    /// `OPENAI_API_KEY` only fills the key when nothing else set it.
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GIT_CX_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = get("GIT_CX_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("GIT_CX_CANDIDATES") {
            parse_setting(&mut self.candidates, "GIT_CX_CANDIDATES", &v);
        }
        if let Some(v) = get("GIT_CX_TIMEOUT") {
            parse_setting(&mut self.timeout_secs, "GIT_CX_TIMEOUT", &v);
        }
        if let Some(v) = get("GIT_CX_COMMAND") {
            self.command = v;
        }
        if let Some(v) = get("GIT_CX_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = get("GIT_CX_API_KEY") {
            self.api.key = v;
        }
        if self.api.key.trim().is_empty()
            && let Some(v) = get("OPENAI_API_KEY")
        {
            self.api.key = v.trim().to_string();
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = &overrides.provider {
            self.provider = v.clone();
        }
        if let Some(v) = &overrides.model {
            self.model = v.clone();
        }
        if let Some(v) = overrides.candidates {
            self.candidates = v;
        }
        if let Some(v) = overrides.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = &overrides.command {
            self.command = v.clone();
        }
        if let Some(v) = &overrides.api_base_url {
            self.api.base_url = v.clone();
        }
    }

    /// Parsed backend selector.
    pub fn backend_kind(&self) -> Result<BackendKind, CxError> {
        self.provider.parse()
    }

    /// Check values for consistency. The provider factory re-checks the
    /// settings it depends on, so this is a fail-early convenience.
    pub fn validate(&self) -> Result<(), CxError> {
        let kind = self.backend_kind()?;

        if self.candidates == 0 {
            return Err(CxError::config("candidates", "must be greater than 0"));
        }
        if self.timeout_secs == 0 {
            return Err(CxError::config("timeout", "must be greater than 0"));
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(CxError::config(
                "timeout",
                format!("must be at most {MAX_TIMEOUT_SECS} seconds"),
            ));
        }

        match kind {
            BackendKind::Custom if self.command.trim().is_empty() => Err(CxError::config(
                "command",
                "not set (required for the custom provider)",
            )),
            BackendKind::Api => {
                endpoint_url(&self.api.base_url)?;
                if self.model.trim().is_empty() {
                    return Err(CxError::config("model", "not set (required for the api provider)"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Human-readable listing of the resolved values. The API key is only
    /// reported as set or not set.
    pub fn summary(&self) -> SettingsSummary<'_> {
        SettingsSummary(self)
    }
}

/// See [`Settings::summary`].
pub struct SettingsSummary<'a>(&'a Settings);

impl fmt::Display for SettingsSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        row(f, "provider", &s.provider)?;
        row(f, "model", &s.model)?;
        row(f, "candidates", s.candidates)?;
        row(f, "timeout", s.timeout_secs)?;
        if !s.command.is_empty() {
            row(f, "command", &s.command)?;
        }
        if !s.api.base_url.trim().is_empty() {
            row(f, "apiBaseUrl", &s.api.base_url)?;
        }
        let key = if s.api.key.trim().is_empty() {
            "<not set>"
        } else {
            "<set>"
        };
        row(f, "apiKey (OPENAI_API_KEY)", key)?;
        row(f, "commit.useEmoji", s.commit.use_emoji)?;
        row(f, "commit.maxSubjectLength", s.commit.max_subject_length)?;
        if !s.commit.scopes.is_empty() {
            row(f, "commit.scopes", s.commit.scopes.join(", "))?;
        }
        Ok(())
    }
}

fn row(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{:<27}{value}", format!("{label}:"))
}

/// Parse `value` into `target`, keeping the old value (with a warning) when
/// it does not parse.
fn parse_setting<T>(target: &mut T, source: &str, value: &str)
where
    T: FromStr + fmt::Display,
{
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => tracing::warn!("Invalid {source} value '{value}', keeping {target}"),
    }
}
