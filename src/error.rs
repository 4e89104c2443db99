use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::dispatch::FailureRecord;

/// Cap on detail strings pulled from provider error bodies.
const MAX_DETAIL_CHARS: usize = 300;

/// Classification of a single instance failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthError,
    RateLimited,
    Timeout,
    NetworkError,
    ParseError,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthError => "auth_error",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::ParseError => "parse_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one provider call. Converted into a `FailureRecord` before it
/// leaves the provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("request error: {0}")]
    Request(reqwest::Error),

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("schema parse error: {0}")]
    SchemaParse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // Gemini keys never sit in the URL, but custom endpoints might.
        Self::Request(e.without_url())
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed { .. } => ErrorKind::AuthError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Request(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Request(e) if e.is_decode() => ErrorKind::ParseError,
            Self::Request(_) => ErrorKind::NetworkError,
            Self::Upstream { .. } => ErrorKind::UnknownError,
            Self::SchemaParse(_) => ErrorKind::ParseError,
        }
    }

    /// Human-readable detail for the failure list shown to the user.
    pub fn detail(&self) -> String {
        let text = match self {
            Self::AuthFailed { message, .. } => message.clone(),
            Self::RateLimited { message, .. } => message.clone(),
            Self::Timeout(ms) => format!("request timed out after {ms}ms"),
            Self::Request(e) => e.to_string(),
            Self::Upstream { message, .. } => message.clone(),
            Self::SchemaParse(msg) => msg.clone(),
        };
        truncate_detail(&text)
    }
}

fn truncate_detail(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    format!("{head}...")
}

/// Cycle-level errors. Any of these aborts the run before the commit step.
#[derive(Debug, Error)]
pub enum FlurryError {
    #[error("no changes left to describe after applying exclusions")]
    EmptyDiff,

    #[error("no AI provider configured; set an API key with `flurry config set <provider>.key=<KEY>`")]
    NoProviderConfigured,

    #[error("all providers failed: {}", summarize(.failures))]
    AllProvidersFailed { failures: Vec<FailureRecord> },

    #[error("no usable commit messages were generated{}", suffix(.failures))]
    NoCandidates { failures: Vec<FailureRecord> },

    #[error("config error: {0}")]
    Config(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FlurryError {
    /// Per-instance failures carried by the aggregate variants.
    pub fn failures(&self) -> &[FailureRecord] {
        match self {
            Self::AllProvidersFailed { failures } | Self::NoCandidates { failures } => failures,
            _ => &[],
        }
    }
}

fn summarize(failures: &[FailureRecord]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn suffix(failures: &[FailureRecord]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" ({})", summarize(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_details_are_truncated() {
        let detail = ProviderError::SchemaParse("x".repeat(1000)).detail();
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn all_failed_lists_every_source() {
        let err = FlurryError::AllProvidersFailed {
            failures: vec![
                FailureRecord::new("OpenAI (gpt-4o-mini)", ErrorKind::AuthError, "bad key"),
                FailureRecord::new("Groq (llama)", ErrorKind::Timeout, "slow"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("OpenAI (gpt-4o-mini): auth_error: bad key"));
        assert!(msg.contains("Groq (llama): timeout: slow"));
    }
}
