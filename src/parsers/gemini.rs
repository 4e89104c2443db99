use serde::Deserialize;

use crate::error::ProviderError;
use crate::parsers::ResponseParser;

/// Parses Gemini `generateContent` responses.
/// Expected shape: `{"candidates": [{"content": {"parts": [{"text": "..."}]}}]}`
pub struct GeminiParser;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContent {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl ResponseParser for GeminiParser {
    fn parse(&self, body: &[u8]) -> Result<Vec<String>, ProviderError> {
        let output: GenerateContent = serde_json::from_slice(body)
            .map_err(|e| ProviderError::SchemaParse(format!("gemini JSON parse failed: {e}")))?;

        // One text per candidate; a candidate's parts are fragments of one answer.
        let texts: Vec<String> = output
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.content.and_then(|content| content.parts))
            .map(|parts| {
                parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .collect();

        if texts.is_empty() {
            let reason = output
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("gemini blocked the prompt: {r}"))
                .unwrap_or_else(|| "gemini response has no text".to_string());
            return Err(ProviderError::SchemaParse(reason));
        }
        Ok(texts)
    }
}
