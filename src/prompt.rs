use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlurryError;

/// Commit message convention the models are asked to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStyle {
    #[default]
    Conventional,
    Gitmoji,
    /// No convention, just a plain message.
    Plain,
}

impl CommitStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conventional => "conventional",
            Self::Gitmoji => "gitmoji",
            Self::Plain => "plain",
        }
    }

    fn format_line(&self) -> &'static str {
        match self {
            Self::Conventional => "<type>(<optional scope>): <description>",
            Self::Gitmoji => ":<emoji>:(<optional scope>): <description>",
            Self::Plain => "<commit message>",
        }
    }

    fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            Self::Conventional => &[
                "docs: Documentation only changes",
                "style: Changes that do not affect the meaning of the code (white-space, formatting, missing semi-colons, etc)",
                "refactor: A code change that neither fixes a bug nor adds a feature",
                "perf: A code change that improves performance",
                "test: Adding missing tests or correcting existing tests",
                "build: Changes that affect the build system or external dependencies",
                "ci: Changes to CI configuration files, scripts",
                "chore: Other changes that don't modify src or test files",
                "revert: Reverts a previous commit",
                "feat: A new feature",
                "fix: A bug fix",
            ],
            Self::Gitmoji => &[
                ":sparkles:: Introduce new features.",
                ":bug:: Fix a bug.",
                ":memo:: Add or update documentation.",
                ":art:: Improve structure / format of the code.",
                ":zap:: Improve performance.",
                ":fire:: Remove code or files.",
                ":ambulance:: Critical hotfix.",
                ":white_check_mark:: Add, update, or pass tests.",
                ":lock:: Fix security or privacy issues.",
                ":rocket:: Deploy stuff.",
                ":lipstick:: Add or update the UI and style files.",
                ":tada:: Begin a project.",
                ":recycle:: Refactor code.",
                ":wrench:: Add or update configuration files.",
                ":bulb:: Add or update comments in source code.",
                ":twisted_rightwards_arrows:: Merge branches.",
            ],
            Self::Plain => &[],
        }
    }

    /// Example subject for the response-format contract.
    fn example_subject(&self, locale: &str) -> &'static str {
        let portuguese = locale
            .split(['-', '_'])
            .next()
            .is_some_and(|l| l.eq_ignore_ascii_case("pt"));
        match (self, portuguese) {
            (Self::Conventional, false) => "fix(auth): fix bug in user authentication process",
            (Self::Conventional, true) => {
                "fix(auth): corrigir erro no processo de autenticação de usuário"
            }
            (Self::Gitmoji, false) => ":sparkles: Add real-time chat feature",
            (Self::Gitmoji, true) => ":sparkles: Adicionar recurso de chat em tempo real",
            (Self::Plain, _) => "Fix bug in user authentication process",
        }
    }
}

impl fmt::Display for CommitStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conventional" => Ok(Self::Conventional),
            "gitmoji" => Ok(Self::Gitmoji),
            "plain" | "" => Ok(Self::Plain),
            other => Err(format!(
                "unknown commit type: {other} (expected conventional, gitmoji or plain)"
            )),
        }
    }
}

/// Where a caller-supplied system prompt comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemPromptSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub style: CommitStyle,
    pub locale: String,
    pub max_length: usize,
    /// Messages requested per model.
    pub count: usize,
    pub custom_system_prompt: Option<SystemPromptSource>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            style: CommitStyle::Conventional,
            locale: "en".to_string(),
            max_length: 50,
            count: 1,
            custom_system_prompt: None,
        }
    }
}

/// The provider-agnostic prompt pair sent to every instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Build the prompt pair for `diff`, dropping files matched by `excluded`.
pub fn build(
    diff: &str,
    excluded: &HashSet<String>,
    options: &PromptOptions,
) -> Result<PromptPair, FlurryError> {
    let filtered = filter_diff(diff, excluded);
    if filtered.trim().is_empty() {
        return Err(FlurryError::EmptyDiff);
    }

    let base = options
        .custom_system_prompt
        .as_ref()
        .and_then(|source| load_custom_prompt(source))
        .map(|template| fill_placeholders(&template, options))
        .unwrap_or_else(|| default_system_prompt(options));

    Ok(PromptPair {
        system_prompt: format!("{base}\n{}", response_contract(options)),
        user_prompt: user_prompt(&filtered),
    })
}

fn load_custom_prompt(source: &SystemPromptSource) -> Option<String> {
    let text = match source {
        SystemPromptSource::Inline(text) => text.clone(),
        SystemPromptSource::File(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "cannot read system prompt file, using built-in prompt: {e}"
                );
                return None;
            }
        },
    };
    (!text.trim().is_empty()).then_some(text)
}

/// Substitute `{locale}`, `{max_length}`, `{type}` and `{generate}`.
/// Unknown placeholders are left as written.
pub fn fill_placeholders(template: &str, options: &PromptOptions) -> String {
    template
        .replace("{locale}", &options.locale)
        .replace("{max_length}", &options.max_length.to_string())
        .replace("{maxLength}", &options.max_length.to_string())
        .replace("{type}", options.style.as_str())
        .replace("{generate}", &options.count.to_string())
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn default_system_prompt(options: &PromptOptions) -> String {
    let style = options.style;
    let count = options.count;
    let types = style.allowed_types();
    let allowed = if types.is_empty() {
        "3. Allowed Types: any".to_string()
    } else {
        let list: Vec<String> = types.iter().map(|t| format!("  - {t}")).collect();
        format!("3. Allowed Types:\n{}", list.join("\n"))
    };

    let lines = [
        "You are an expert Git commit message writer specializing in analyzing code changes and creating precise, meaningful commit messages.".to_string(),
        format!(
            "Your task is to generate exactly {count} {style} style commit message{} based on the provided git diff.",
            plural(count)
        ),
        String::new(),
        "## Requirements:".to_string(),
        format!("1. Language: Write all messages in {}", options.locale),
        format!("2. Format: Strictly follow the {style} commit format:"),
        style.format_line().to_string(),
        allowed,
        String::new(),
        "## Guidelines:".to_string(),
        format!(
            "- Subject line: Max {} characters, imperative mood, no period",
            options.max_length
        ),
        "- Analyze the diff to understand:".to_string(),
        "  * What files were changed".to_string(),
        "  * What functionality was added, modified, or removed".to_string(),
        "  * The scope and impact of changes".to_string(),
        "- Scope: Extract from file paths or logical grouping (e.g., auth, api, ui)".to_string(),
        String::new(),
        "## Important:".to_string(),
        "- Keep messages short and concise: subject line only, no body or footer.".to_string(),
        "- Focus on WHAT changed, not detailed explanations.".to_string(),
    ];
    lines.join("\n")
}

/// Output-format instructions appended to every system prompt, built-in or
/// custom, since message extraction depends on them.
fn response_contract(options: &PromptOptions) -> String {
    let count = options.count;
    let example = options.style.example_subject(&options.locale);
    let examples: Vec<String> = (0..count.max(1))
        .map(|_| format!("  {{\n    \"subject\": \"{example}\"\n  }}"))
        .collect();

    [
        format!("\nRespond in {}.", options.locale),
        format!(
            "Provide your response as a JSON array containing exactly {count} object{}, each with the following key:",
            plural(count)
        ),
        format!(
            "- \"subject\": The commit message using the {} style. Concise, max one line.",
            options.style
        ),
        format!(
            "The array must always contain {count} element{}, no more and no less.",
            plural(count)
        ),
        format!("Example response format: \n[\n{}\n]", examples.join(",\n")),
        "The response must be valid, parseable JSON. Do NOT include body or footer fields."
            .to_string(),
    ]
    .join("\n")
}

fn user_prompt(diff: &str) -> String {
    format!(
        "Please analyze the following diff and generate commit message(s) based on the changes:\n\n\
         ```diff\n{diff}\n```\n\n\
         Focus on understanding the purpose and impact of these changes to create meaningful commit message(s)."
    )
}

/// Drop every file section of a unified diff whose path matches `excluded`.
///
/// Sections start at `diff --git` lines. Text before the first section is
/// kept as-is. A diff without any section header passes through unchanged.
pub fn filter_diff(diff: &str, excluded: &HashSet<String>) -> String {
    if excluded.is_empty() {
        return diff.to_string();
    }

    let mut out = String::with_capacity(diff.len());
    let mut keep = true;
    for line in diff.split_inclusive('\n') {
        if let Some(header) = line.strip_prefix("diff --git ") {
            keep = !section_paths(header)
                .iter()
                .any(|path| excluded.iter().any(|pattern| path_matches(path, pattern)));
            if !keep {
                tracing::debug!(header = header.trim_end(), "excluding diff section");
            }
        }
        if keep {
            out.push_str(line);
        }
    }
    out
}

/// Paths named by a `diff --git a/<old> b/<new>` header.
fn section_paths(header: &str) -> Vec<String> {
    let header = header.trim_end();
    // Paths may contain spaces, so split on the " b/" separator.
    if let Some(rest) = header.strip_prefix("a/")
        && let Some(idx) = rest.find(" b/")
    {
        let old = &rest[..idx];
        let new = &rest[idx + 3..];
        return vec![old.to_string(), new.to_string()];
    }
    header
        .split_whitespace()
        .map(|p| p.trim_matches('"').to_string())
        .collect()
}

/// Match a diff path against one exclusion pattern.
///
/// Supports exact paths, path suffixes on a `/` boundary (`uv.lock` matches
/// `py/uv.lock`), and a leading `*` wildcard on the file name (`*.lock`).
pub fn path_matches(path: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().trim_start_matches("./");
    if pattern.is_empty() {
        return false;
    }
    if let Some(ext) = pattern.strip_prefix('*') {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        return !ext.is_empty() && file_name.ends_with(ext);
    }
    path == pattern
        || path
            .strip_suffix(pattern)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_requires_path_boundary() {
        assert!(path_matches("uv.lock", "uv.lock"));
        assert!(path_matches("backend/uv.lock", "uv.lock"));
        assert!(!path_matches("backend/myuv.lock", "uv.lock"));
    }

    #[test]
    fn wildcard_matches_file_name_suffix() {
        assert!(path_matches("Cargo.lock", "*.lock"));
        assert!(path_matches("web/bun.lockb", "*.lockb"));
        assert!(!path_matches("src/lock.rs", "*.lock"));
        assert!(!path_matches("anything", "*"));
    }

    #[test]
    fn header_with_spaces_in_path() {
        assert_eq!(
            section_paths("a/my dir/f.txt b/my dir/f.txt\n"),
            vec!["my dir/f.txt".to_string(), "my dir/f.txt".to_string()]
        );
    }

    #[test]
    fn style_parses_empty_as_plain() {
        assert_eq!("".parse::<CommitStyle>(), Ok(CommitStyle::Plain));
        assert_eq!("Gitmoji".parse::<CommitStyle>(), Ok(CommitStyle::Gitmoji));
    }
}
