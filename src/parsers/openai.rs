use serde::Deserialize;

use crate::error::ProviderError;
use crate::parsers::ResponseParser;

/// Parses OpenAI-compatible chat completion responses.
/// Expected shape: `{"choices": [{"message": {"content": "..."}}]}`
pub struct OpenAiParser;

#[derive(Deserialize)]
struct ChatCompletion {
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

impl ResponseParser for OpenAiParser {
    fn parse(&self, body: &[u8]) -> Result<Vec<String>, ProviderError> {
        let completion: ChatCompletion = serde_json::from_slice(body).map_err(|e| {
            ProviderError::SchemaParse(format!("failed to parse chat completion: {e}"))
        })?;

        let texts: Vec<String> = completion
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .collect();

        if texts.is_empty() {
            return Err(ProviderError::SchemaParse(
                "empty choices or null content".to_string(),
            ));
        }
        Ok(texts)
    }
}
