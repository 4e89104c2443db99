pub mod gemini;
pub mod messages;
pub mod openai;

use serde::Deserialize;

use crate::dispatch::registry::ApiFormat;
use crate::error::ProviderError;
use crate::parsers::gemini::GeminiParser;
use crate::parsers::openai::OpenAiParser;

/// Trait for turning a provider's 2xx response body into completion texts.
/// Each wire format has its own response shape.
pub trait ResponseParser: Send + Sync {
    /// Parse raw response bytes into the ordered completion texts.
    fn parse(&self, body: &[u8]) -> Result<Vec<String>, ProviderError>;
}

/// Resolve the parser for a wire format.
pub fn parser_for(format: ApiFormat) -> &'static dyn ResponseParser {
    match format {
        ApiFormat::OpenAi => &OpenAiParser,
        ApiFormat::Gemini => &GeminiParser,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Object {
        message: Option<String>,
        status: Option<String>,
    },
    Text(String),
}

/// Pull the human-readable message out of an error payload.
///
/// OpenAI, Groq, OpenRouter and Gemini all wrap errors as
/// `{"error": {"message": ...}}`; some proxies send `{"error": "..."}`.
/// Returns None when the body has neither shape.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
    let message = match envelope.error {
        ErrorBody::Object { message, status } => match (message, status) {
            (Some(m), Some(s)) if !m.trim().is_empty() => format!("{m} ({s})"),
            (Some(m), None) => m,
            (Some(_), Some(s)) | (None, Some(s)) => s,
            (None, None) => return None,
        },
        ErrorBody::Text(text) => text,
    };
    let message = message.trim().to_string();
    (!message.is_empty()).then_some(message)
}
