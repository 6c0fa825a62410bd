//! Provider error taxonomy.
//!
//! Every provider failure is classified into one [`ProviderErrorKind`]. The
//! classification alone decides retryability; callers at the transport
//! boundary use it to pick a status code and a retry policy.

use thiserror::Error;

/// Canonical kinds of provider failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    #[error("llm provider unavailable")]
    Unavailable,

    #[error("bad request to llm provider")]
    BadRequest,

    #[error("llm provider rate limited")]
    RateLimited,

    #[error("llm request timeout")]
    Timeout,

    #[error("llm provider unauthorized")]
    Unauthorized,

    #[error("llm model not found")]
    ModelNotFound,

    /// Anything the taxonomy does not name (unexpected status, bad payload).
    #[error("{0}")]
    Other(String),
}

impl ProviderErrorKind {
    /// Map a non-success backend HTTP status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            404 => Self::ModelNotFound,
            429 => Self::RateLimited,
            500 | 502 | 503 => Self::Unavailable,
            504 => Self::Timeout,
            other => Self::Other(format!("unexpected status code: {other}")),
        }
    }

    /// Rate limiting, timeouts and an unreachable backend are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout | Self::RateLimited)
    }

    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "provider_unavailable",
            Self::BadRequest => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Unauthorized => "unauthorized",
            Self::ModelNotFound => "model_not_found",
            Self::Other(_) => "unclassified",
        }
    }
}

/// A classified failure from one provider call, with enough context to
/// report it: which provider, which model, and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub kind: ProviderErrorKind,
    pub message: Option<String>,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            provider: provider.into(),
            model: model.into(),
            kind,
            message: (!message.is_empty()).then_some(message),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(
                f,
                "{} provider error (model: {}): {} - {}",
                self.provider, self.model, message, self.kind
            ),
            None => write!(
                f,
                "{} provider error (model: {}): {}",
                self.provider, self.model, self.kind
            ),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Whether a provider failure is worth retrying. Pure function of the kind.
pub fn is_retryable(err: &ProviderError) -> bool {
    err.is_retryable()
}
