use thiserror::Error;

#[derive(Debug, Error)]
pub enum CxError {
    #[error("invalid setting `{setting}`: {message}")]
    Config { setting: String, message: String },

    #[error("unknown provider: {value:?} (valid providers: {})", valid.join(", "))]
    UnknownBackend {
        value: String,
        valid: Vec<&'static str>,
    },

    #[error("{backend} failed: {message}")]
    Invocation {
        backend: String,
        message: String,
        status: Option<u16>,
    },

    #[error("{backend} timed out after {secs}s")]
    Timeout { backend: String, secs: u64 },

    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("failed to parse response: {0}")]
    SchemaParse(String),

    #[error("{backend} returned no choices")]
    NoChoices { backend: String },

    #[error("{backend} does not support body/footer generation")]
    DetailUnsupported { backend: String },

    #[error("unexpected invocation: {0}")]
    UnexpectedInvocation(String),
}

impl CxError {
    pub(crate) fn config(setting: &str, message: impl Into<String>) -> Self {
        Self::Config {
            setting: setting.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invocation(backend: &str, message: impl Into<String>) -> Self {
        Self::Invocation {
            backend: backend.to_string(),
            message: message.into(),
            status: None,
        }
    }

    /// Extract the backend name from variants raised during generation.
    /// Returns None for construction-time and parse errors.
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::Invocation { backend, .. } => Some(backend),
            Self::Timeout { backend, .. } => Some(backend),
            Self::NoChoices { backend } => Some(backend),
            Self::DetailUnsupported { backend } => Some(backend),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true for transient errors that may succeed when re-invoked.
    /// The core never retries on its own; this is input for caller policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            // 5xx = server error, 4xx = client error. Non-HTTP failures
            // (process exits, connection errors) carry no status.
            Self::Invocation { status, .. } => status.is_some_and(|s| s >= 500 || s == 429),
            _ => false,
        }
    }

    /// True for errors raised while building a provider, before any call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::UnknownBackend { .. })
    }
}
