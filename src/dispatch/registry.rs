use std::fmt;
use std::str::FromStr;

use crate::dispatch::RequestInstance;

/// Supported provider variants, in fan-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Groq,
    OpenRouter,
}

/// Wire format spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    /// OpenAI-compatible chat completions.
    OpenAi,
    /// Google `generateContent`.
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
        ProviderKind::Groq,
        ProviderKind::OpenRouter,
    ];

    /// Display name used in source labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
            Self::Groq => "Groq",
            Self::OpenRouter => "OpenRouter",
        }
    }

    /// Config table name and `<KEY>_API_KEY` prefix (lowercase).
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    pub fn env_var(&self) -> String {
        format!("{}_API_KEY", self.config_key().to_uppercase())
    }

    pub fn api_format(&self) -> ApiFormat {
        match self {
            Self::Gemini => ApiFormat::Gemini,
            Self::OpenAi | Self::Groq | Self::OpenRouter => ApiFormat::OpenAi,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.1-8b-instant",
            Self::OpenRouter => "google/gemini-2.0-flash-001",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Groq => "https://api.groq.com",
            Self::OpenRouter => "https://openrouter.ai/api",
        }
    }

    pub fn default_path(&self) -> &'static str {
        match self {
            Self::Gemini => "/v1beta/models",
            Self::OpenAi => "/v1/chat/completions",
            Self::Groq => "/openai/v1/chat/completions",
            Self::OpenRouter => "/v1/chat/completions",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|p| p.config_key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

/// Resolved settings for one provider. A config without an API key is
/// inactive and never yields a request instance.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: ProviderKind,
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub base_url: Option<String>,
    pub path: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl ProviderConfig {
    /// Defaults for `name` with no key set.
    pub fn new(name: ProviderKind) -> Self {
        Self {
            name,
            api_key: None,
            models: vec![name.default_model().to_string()],
            base_url: None,
            path: None,
            max_tokens: 2048,
            temperature: 0.7,
            top_p: 1.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Endpoint for `model`, honoring `base_url`/`path` overrides.
    pub fn endpoint_for(&self, model: &str) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.name.default_base_url());
        let path = self
            .path
            .as_deref()
            .unwrap_or_else(|| self.name.default_path());
        let url = join_url(base, path);
        match self.name.api_format() {
            ApiFormat::OpenAi => url,
            ApiFormat::Gemini => format!("{url}/{model}:generateContent"),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.is_active() { "[REDACTED]" } else { "<unset>" };
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &key)
            .field("models", &self.models)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .finish()
    }
}

/// Expand active configs into request instances: provider order first,
/// then model order within each provider.
pub fn expand_instances(configs: &[ProviderConfig]) -> Vec<RequestInstance> {
    let mut instances = Vec::new();
    for config in configs.iter().filter(|c| c.is_active()) {
        let api_key = config.api_key.clone().unwrap_or_default();
        for model in &config.models {
            instances.push(RequestInstance {
                provider: config.name,
                model: model.to_string(),
                api_key: api_key.clone(),
                endpoint: config.endpoint_for(model),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            });
        }
    }
    instances
}

/// Join a base URL and a path with exactly one slash between them.
/// A base that already ends with the path is returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim();
    if path.is_empty() || base.ends_with(path.trim_end_matches('/')) {
        return base.to_string();
    }
    format!("{base}/{}", path.trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://a.io/", "/v1/x"), "https://a.io/v1/x");
        assert_eq!(join_url("https://a.io", "v1/x"), "https://a.io/v1/x");
        assert_eq!(join_url("https://a.io/v1/x", "/v1/x"), "https://a.io/v1/x");
        assert_eq!(join_url("https://a.io", ""), "https://a.io");
    }

    #[test]
    fn gemini_endpoint_includes_model_and_method() {
        let cfg = ProviderConfig::new(ProviderKind::Gemini);
        assert_eq!(
            cfg.endpoint_for("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OPENROUTER".parse::<ProviderKind>(), Ok(ProviderKind::OpenRouter));
        assert!("anthropic".parse::<ProviderKind>().is_err());
    }
}
