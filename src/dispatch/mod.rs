pub mod http;
pub mod registry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::dispatch::registry::ProviderKind;
use crate::error::{ErrorKind, ProviderError};

/// Prompt pair plus generation knobs, built once per cycle and shared
/// read-only by every instance.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Messages requested from each model.
    pub count: usize,
    /// Per-instance time limit. The fan-out enforces it; HTTP calls also pass it
    /// to the transport.
    pub timeout: Duration,
}

/// One concrete (provider, model) pair resolved at fan-out time.
#[derive(Clone)]
pub struct RequestInstance {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    /// Fully resolved URL for this model's completion call.
    pub endpoint: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl RequestInstance {
    /// Display label, e.g. `OpenAI (gpt-4o-mini)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.provider, self.model)
    }
}

impl fmt::Debug for RequestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInstance")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .finish()
    }
}

/// A failed instance, kept for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub source: String,
    pub kind: ErrorKind,
    pub detail: String,
}

impl FailureRecord {
    pub fn new(source: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_error(source: impl Into<String>, err: &ProviderError) -> Self {
        Self::new(source, err.kind(), err.detail())
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.source, self.kind, self.detail)
    }
}

/// Terminal outcome of exactly one request instance.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Success { source: String, messages: Vec<String> },
    Failure(FailureRecord),
}

impl GenerationResult {
    pub fn failure(source: impl Into<String>, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Failure(FailureRecord::new(source, kind, detail))
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Success { source, .. } => source,
            Self::Failure(f) => &f.source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Uniform capability over the provider APIs.
///
/// Every outcome, including transport errors, comes back as a
/// `GenerationResult`; nothing is raised past this boundary.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        instance: &RequestInstance,
    ) -> GenerationResult;
}
