use serde_json::Value;

use crate::error::ProviderError;

/// Characters LLMs like to wrap a one-line answer in.
const WRAPPING_QUOTES: &[char] = &['"', '\'', '`'];

/// Strip a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (e.g. "json") on the opening fence line.
        text = match rest.find('\n') {
            Some(nl) if !rest[..nl].trim().contains(' ') => &rest[nl + 1..],
            _ => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Strip quote characters that surround a whole message.
///
/// A pair is only removed when the quote does not also appear inside, so
/// `'a' and 'b'` is left intact.
pub fn strip_wrapping_quotes(text: &str) -> &str {
    let mut text = text.trim();
    while let Some(first) = text.chars().next() {
        if !WRAPPING_QUOTES.contains(&first) || text.len() < 2 || !text.ends_with(first) {
            break;
        }
        let inner = &text[1..text.len() - 1];
        if inner.contains(first) {
            break;
        }
        text = inner.trim();
    }
    text
}

/// Extract up to `count` commit messages from one completion text.
///
/// The prompt asks for a JSON array of `{"subject", "body"?, "footer"?}`
/// objects. A single object or bare strings are accepted too. Content that
/// is not JSON at all is taken verbatim as one message.
pub fn parse_messages(text: &str, count: usize) -> Result<Vec<String>, ProviderError> {
    let cleaned = strip_code_fence(text);
    if cleaned.is_empty() {
        return Err(ProviderError::SchemaParse("empty completion".to_string()));
    }

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(_) => {
            let message = strip_wrapping_quotes(cleaned);
            if message.is_empty() {
                return Err(ProviderError::SchemaParse("empty completion".to_string()));
            }
            return Ok(vec![message.to_string()]);
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let messages: Vec<String> = items
        .iter()
        .filter_map(message_from_item)
        .take(count.max(1))
        .collect();

    if messages.is_empty() {
        return Err(ProviderError::SchemaParse(format!(
            "no commit messages found in response: {}",
            preview(cleaned)
        )));
    }
    Ok(messages)
}

fn message_from_item(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => {
            let s = strip_wrapping_quotes(s);
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => {
            let field = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };
            let subject = strip_wrapping_quotes(field("subject")?);
            if subject.is_empty() {
                return None;
            }
            let mut message = subject.to_string();
            for extra in [field("body"), field("footer")].into_iter().flatten() {
                message.push_str("\n\n");
                message.push_str(extra);
            }
            Some(message)
        }
        _ => None,
    }
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(120).collect();
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_with_language_tag_is_removed() {
        let text = "```json\n[{\"subject\": \"feat: x\"}]\n```";
        assert_eq!(strip_code_fence(text), "[{\"subject\": \"feat: x\"}]");
    }

    #[test]
    fn inline_fence_is_removed() {
        assert_eq!(strip_code_fence("```json[1]```"), "[1]");
    }

    #[test]
    fn nested_quotes_are_stripped() {
        assert_eq!(strip_wrapping_quotes("\"`fix: typo`\""), "fix: typo");
    }

    #[test]
    fn lone_quote_is_kept() {
        assert_eq!(strip_wrapping_quotes("\""), "\"");
    }

    #[test]
    fn quotes_used_inside_the_message_are_kept() {
        assert_eq!(
            strip_wrapping_quotes("'feat: add x' and 'y'"),
            "'feat: add x' and 'y'"
        );
        assert_eq!(
            strip_wrapping_quotes("\"fix: handle `None` input\""),
            "fix: handle `None` input"
        );
    }
}
