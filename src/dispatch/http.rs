use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::dispatch::{DetailProvider, GenerateRequest, Provider};
use crate::error::CxError;
use crate::parsers::{Detail, parse_candidates, parse_detail_output};
use crate::prompt::{build_detail_prompt, build_subject_prompt};

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Response bodies larger than this are rejected.
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Raw-body snippet length used when an error response has no decodable message.
pub const MAX_ERROR_SNIPPET_CHARS: usize = 512;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<usize>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// OpenAI-compatible chat-completions backend.
pub struct HostedApiProvider {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for HostedApiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedApiProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HostedApiProvider {
    pub const NAME: &'static str = "api";

    /// Validates the base URL up front; no request is ever sent with a bad one.
    pub fn new(settings: &Settings) -> Result<Self, CxError> {
        let endpoint = endpoint_url(&settings.api.base_url)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CxError::config("api", format!("failed to build HTTP client: {e}")))?;

        let api_key = Some(settings.api.key.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one chat completion and return each choice's message text.
    async fn complete(&self, prompt: &str, n: Option<usize>) -> Result<Vec<String>, CxError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            n,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            ?n,
            "sending chat completion"
        );

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let bytes = self.read_capped(response).await?;

        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        let completion: ChatCompletion = serde_json::from_slice(&bytes)
            .map_err(|e| CxError::SchemaParse(format!("chat completion: {e}")))?;

        Ok(completion
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect())
    }

    /// Read the body, failing once it exceeds [`MAX_RESPONSE_BYTES`].
    async fn read_capped(&self, mut response: Response) -> Result<Vec<u8>, CxError> {
        if let Some(len) = response.content_length()
            && len > MAX_RESPONSE_BYTES as u64
        {
            return Err(too_large(len));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.request_error(e))? {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn request_error(&self, err: reqwest::Error) -> CxError {
        if err.is_timeout() {
            CxError::Timeout {
                backend: Self::NAME.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            CxError::invocation(Self::NAME, format!("request failed: {err}"))
        }
    }
}

#[async_trait]
impl Provider for HostedApiProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<Vec<String>, CxError> {
        let max = req.candidate_count;
        let n = (max > 1).then_some(max);
        let contents = self.complete(&build_subject_prompt(req), n).await?;

        // Each choice is re-split into lines; a single choice may carry
        // several suggestions.
        let mut candidates = Vec::new();
        for content in &contents {
            candidates.extend(parse_candidates(content, max));
            if max > 0 && candidates.len() >= max {
                break;
            }
        }
        if max > 0 {
            candidates.truncate(max);
        }
        Ok(candidates)
    }

    fn as_detail(&self) -> Option<&dyn DetailProvider> {
        Some(self)
    }
}

#[async_trait]
impl DetailProvider for HostedApiProvider {
    async fn generate_detail(&self, req: &GenerateRequest) -> Result<Detail, CxError> {
        let contents = self.complete(&build_detail_prompt(req), None).await?;
        let first = contents.into_iter().next().ok_or_else(|| CxError::NoChoices {
            backend: Self::NAME.to_string(),
        })?;
        Ok(parse_detail_output(&first))
    }
}

/// `<base_url with trailing slash trimmed>/chat/completions`.
/// The base URL must carry a scheme and a host.
pub fn endpoint_url(base_url: &str) -> Result<Url, CxError> {
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return Err(CxError::config(
            "api.base_url",
            "not set (required for the api provider)",
        ));
    }

    let mut url = Url::parse(base_url)
        .map_err(|e| CxError::config("api.base_url", format!("invalid URL {base_url:?}: {e}")))?;
    if url.scheme().is_empty() || url.host_str().is_none_or(str::is_empty) {
        return Err(CxError::config(
            "api.base_url",
            "base URL must include scheme and host",
        ));
    }

    let path = format!("{}{CHAT_COMPLETIONS_PATH}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

fn too_large(len: u64) -> CxError {
    CxError::invocation(
        HostedApiProvider::NAME,
        format!("response too large: {len} bytes (max {MAX_RESPONSE_BYTES})"),
    )
}

/// Most specific message for a non-success response: the decoded
/// `error.message`, else a capped raw-body snippet with the status text.
fn status_error(status: StatusCode, body: &[u8]) -> CxError {
    let decoded = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    let message = decoded.unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body);
        let snippet: String = text.trim().chars().take(MAX_ERROR_SNIPPET_CHARS).collect();
        if snippet.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {snippet}")
        }
    });

    CxError::Invocation {
        backend: HostedApiProvider::NAME.to_string(),
        message,
        status: Some(status.as_u16()),
    }
}
