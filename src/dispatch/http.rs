use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};

use crate::dispatch::registry::{ApiFormat, ProviderKind};
use crate::dispatch::{
    FailureRecord, GenerationRequest, GenerationResult, ProviderClient, RequestInstance,
};
use crate::error::ProviderError;
use crate::parsers::messages::parse_messages;
use crate::parsers::{extract_error_message, parser_for};

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Attribution headers OpenRouter asks clients to send.
const OPENROUTER_REFERER: &str = "https://github.com/flurry-cli/flurry";
const OPENROUTER_TITLE: &str = "flurry";

/// Model families that reject `max_tokens`/`top_p` and a custom temperature.
const REASONING_PREFIXES: &[&str] = &["o1", "o3", "gpt-5"];

/// Provider client that speaks each variant's HTTP chat-completion API.
pub struct HttpDispatch {
    client: Client,
}

impl HttpDispatch {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self { client })
    }

    /// Issue one completion call and return the extracted messages.
    pub async fn query_model(
        &self,
        req: &GenerationRequest,
        instance: &RequestInstance,
    ) -> Result<Vec<String>, ProviderError> {
        let provider = instance.provider.as_str();
        let format = instance.provider.api_format();

        let response = self
            .build_request(req, instance)
            .timeout(req.timeout)
            .send()
            .await?;

        let status = response.status();
        let too_large = |size: String| ProviderError::Upstream {
            provider: provider.to_string(),
            message: format!("response too large: {size} (max {MAX_RESPONSE_BYTES})"),
            status: Some(status.as_u16()),
        };

        // Declared length is checked up front; chunked bodies are counted
        // as they stream in.
        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_BYTES
        {
            return Err(too_large(format!("{len} bytes")));
        }
        let (bytes, truncated) = read_capped(response, MAX_RESPONSE_BYTES).await?;

        // A truncated error body still carries a usable message prefix.
        if !status.is_success() {
            return Err(classify_status(instance.provider, status, &bytes));
        }
        if truncated {
            return Err(too_large(format!("over {} bytes", bytes.len())));
        }

        let texts = parser_for(format).parse(&bytes)?;

        let mut messages = Vec::new();
        let mut last_err = None;
        for text in &texts {
            match parse_messages(text, req.count) {
                Ok(found) => messages.extend(found),
                Err(e) => last_err = Some(e),
            }
        }
        if messages.is_empty() {
            return Err(last_err.unwrap_or_else(|| {
                ProviderError::SchemaParse("no commit messages in response".to_string())
            }));
        }
        messages.truncate(req.count.max(1));
        Ok(messages)
    }

    fn build_request(&self, req: &GenerationRequest, instance: &RequestInstance) -> RequestBuilder {
        match instance.provider.api_format() {
            ApiFormat::OpenAi => {
                let builder = self
                    .client
                    .post(&instance.endpoint)
                    .bearer_auth(&instance.api_key)
                    .json(&openai_body(req, instance));
                if instance.provider == ProviderKind::OpenRouter {
                    builder
                        .header("HTTP-Referer", OPENROUTER_REFERER)
                        .header("X-Title", OPENROUTER_TITLE)
                } else {
                    builder
                }
            }
            ApiFormat::Gemini => self
                .client
                .post(&instance.endpoint)
                .header("x-goog-api-key", &instance.api_key)
                .json(&gemini_body(req, instance)),
        }
    }
}

#[async_trait]
impl ProviderClient for HttpDispatch {
    async fn generate(
        &self,
        request: &GenerationRequest,
        instance: &RequestInstance,
    ) -> GenerationResult {
        let label = instance.label();
        let start = Instant::now();
        match self.query_model(request, instance).await {
            Ok(messages) => {
                tracing::debug!(
                    source = %label,
                    count = messages.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "provider returned messages"
                );
                GenerationResult::Success {
                    source: label,
                    messages,
                }
            }
            Err(e) => {
                tracing::warn!(source = %label, kind = %e.kind(), "provider call failed: {e}");
                GenerationResult::Failure(FailureRecord::from_error(label, &e))
            }
        }
    }
}

/// Read at most `cap` bytes of the body. The flag is set when more data
/// was on the way; the rest is never buffered.
async fn read_capped(
    mut response: reqwest::Response,
    cap: usize,
) -> Result<(Vec<u8>, bool), ProviderError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = cap - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Map a non-2xx status (and its body) to a provider error.
pub fn classify_status(provider: ProviderKind, status: StatusCode, body: &[u8]) -> ProviderError {
    let name = provider.as_str().to_string();
    let message = extract_error_message(body).unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {text}")
        }
    });

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited {
            provider: name,
            message,
        };
    }

    // Gemini answers a bad key with 400 INVALID_ARGUMENT.
    let gemini_bad_key = provider == ProviderKind::Gemini
        && status == StatusCode::BAD_REQUEST
        && message.contains("API key not valid");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || gemini_bad_key {
        return ProviderError::AuthFailed {
            provider: name,
            message,
        };
    }

    ProviderError::Upstream {
        provider: name,
        message,
        status: Some(status.as_u16()),
    }
}

/// True for OpenAI reasoning models (`o1`, `o3-mini`, `gpt-5.1`, ...).
pub fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_lowercase();
    REASONING_PREFIXES.iter().any(|p| {
        model == *p || model.starts_with(&format!("{p}-")) || model.starts_with(&format!("{p}."))
    })
}

/// Chat-completions body for OpenAI-compatible providers.
pub fn openai_body(req: &GenerationRequest, instance: &RequestInstance) -> Value {
    let mut body = json!({
        "model": instance.model,
        "messages": [
            {"role": "system", "content": req.system_prompt},
            {"role": "user", "content": req.user_prompt},
        ],
        "n": 1,
    });

    if instance.provider == ProviderKind::OpenAi && is_reasoning_model(&instance.model) {
        body["max_completion_tokens"] = json!(instance.max_tokens);
        body["temperature"] = json!(1.0);
    } else {
        body["max_tokens"] = json!(instance.max_tokens);
        body["temperature"] = json!(instance.temperature);
        body["top_p"] = json!(instance.top_p);
    }
    body
}

/// `generateContent` body for Gemini.
pub fn gemini_body(req: &GenerationRequest, instance: &RequestInstance) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{"text": req.system_prompt}]
        },
        "contents": [
            {"role": "user", "parts": [{"text": req.user_prompt}]}
        ],
        "generationConfig": {
            "temperature": instance.temperature,
            "maxOutputTokens": instance.max_tokens,
            "topP": instance.top_p,
            "responseMimeType": "application/json",
        }
    })
}
