use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dispatch::registry::{ProviderConfig, ProviderKind};
use crate::error::FlurryError;
use crate::prompt::{CommitStyle, PromptOptions, SystemPromptSource};

pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_GENERATE: usize = 1;
pub const DEFAULT_MAX_LENGTH: usize = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "*.lock",
    "*.lockb",
    "uv.lock",
    "poetry.lock",
];

/// Upper bound on messages requested per model.
pub const MAX_GENERATE: usize = 10;

const GENERAL_KEYS: &[&str] = &[
    "locale",
    "generate",
    "type",
    "max_length",
    "timeout",
    "max_tokens",
    "temperature",
    "top_p",
    "system_prompt",
    "system_prompt_path",
    "excludes",
];

const PROVIDER_KEYS: &[&str] = &["key", "model", "url", "path", "max_tokens", "temperature", "top_p"];

/// Fully resolved configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub locale: String,
    pub generate: usize,
    pub style: CommitStyle,
    pub max_length: usize,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub system_prompt: Option<String>,
    pub system_prompt_path: Option<PathBuf>,
    pub excludes: Vec<String>,
    /// One entry per provider variant, in fan-out order.
    pub providers: Vec<ProviderConfig>,
}

/// Command-line values that win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub locale: Option<String>,
    pub generate: Option<usize>,
    pub style: Option<CommitStyle>,
    pub timeout_ms: Option<u64>,
    /// Appended to the configured exclusions.
    pub excludes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    /// Comma-separated strings are split; blanks are dropped.
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            Self::One(s) => s.split(',').map(str::to_string).collect(),
            Self::Many(v) => v,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    locale: Option<String>,
    generate: Option<usize>,
    #[serde(rename = "type")]
    style: Option<String>,
    max_length: Option<usize>,
    timeout: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    system_prompt: Option<String>,
    system_prompt_path: Option<String>,
    excludes: Option<StringList>,
    gemini: Option<RawProvider>,
    openai: Option<RawProvider>,
    groq: Option<RawProvider>,
    openrouter: Option<RawProvider>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProvider {
    key: Option<String>,
    #[serde(alias = "models")]
    model: Option<StringList>,
    url: Option<String>,
    path: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    top_p: Option<f64>,
}

impl RawConfig {
    fn take_provider(&mut self, kind: ProviderKind) -> Option<RawProvider> {
        match kind {
            ProviderKind::Gemini => self.gemini.take(),
            ProviderKind::OpenAi => self.openai.take(),
            ProviderKind::Groq => self.groq.take(),
            ProviderKind::OpenRouter => self.openrouter.take(),
        }
    }
}

impl Config {
    /// Load from the config file (if any), the process environment and
    /// `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self, FlurryError> {
        let env = |name: &str| std::env::var(name).ok();
        let path = config_path(env);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml_str(&text, env, overrides)
    }

    /// Resolve with precedence overrides > env > file > defaults.
    pub fn from_toml_str(
        text: &str,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Self, FlurryError> {
        let mut raw: RawConfig = toml::from_str(text)?;

        let style = match (&overrides.style, raw.style.as_deref()) {
            (Some(style), _) => *style,
            (None, Some(s)) => s.parse().map_err(FlurryError::Config)?,
            (None, None) => CommitStyle::default(),
        };

        let max_tokens = raw.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let temperature = raw.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let top_p = raw.top_p.unwrap_or(DEFAULT_TOP_P);

        let mut providers = Vec::with_capacity(ProviderKind::ALL.len());
        for kind in ProviderKind::ALL {
            let file = raw.take_provider(kind).unwrap_or_default();
            let mut provider = ProviderConfig::new(kind);
            provider.api_key = env(&kind.env_var())
                .filter(|k| !k.trim().is_empty())
                .or(file.key)
                .map(|k| k.trim().to_string());
            if let Some(models) = file.model.map(StringList::into_vec)
                && !models.is_empty()
            {
                provider.models = models;
            }
            provider.base_url = file.url.filter(|u| !u.trim().is_empty());
            provider.path = file.path;
            provider.max_tokens = file.max_tokens.unwrap_or(max_tokens);
            provider.temperature = file.temperature.unwrap_or(temperature);
            provider.top_p = file.top_p.unwrap_or(top_p);
            validate_sampling(kind.config_key(), provider.temperature, provider.top_p)?;
            providers.push(provider);
        }

        let mut excludes = match raw.excludes {
            Some(list) => list.into_vec(),
            None => DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        };
        excludes.extend(
            overrides
                .excludes
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );

        let generate = overrides
            .generate
            .or(raw.generate)
            .unwrap_or(DEFAULT_GENERATE);
        if !(1..=MAX_GENERATE).contains(&generate) {
            return Err(FlurryError::Config(format!(
                "generate must be between 1 and {MAX_GENERATE}, got {generate}"
            )));
        }

        let timeout_ms = overrides
            .timeout_ms
            .or(raw.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(FlurryError::Config("timeout must be greater than 0".to_string()));
        }

        Ok(Config {
            locale: overrides
                .locale
                .clone()
                .or(raw.locale)
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            generate,
            style,
            max_length: raw.max_length.unwrap_or(DEFAULT_MAX_LENGTH),
            timeout_ms,
            max_tokens,
            temperature,
            top_p,
            system_prompt: raw.system_prompt.filter(|s| !s.trim().is_empty()),
            system_prompt_path: raw
                .system_prompt_path
                .filter(|s| !s.trim().is_empty())
                .map(|p| expand_home(&p, &env)),
            excludes,
            providers,
        })
    }

    pub fn active_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.is_active())
    }

    /// Prompt options derived from this config. An inline system prompt
    /// wins over a prompt file.
    pub fn prompt_options(&self) -> PromptOptions {
        let custom_system_prompt = match (&self.system_prompt, &self.system_prompt_path) {
            (Some(text), _) => Some(SystemPromptSource::Inline(text.clone())),
            (None, Some(path)) => Some(SystemPromptSource::File(path.clone())),
            (None, None) => None,
        };
        PromptOptions {
            style: self.style,
            locale: self.locale.clone(),
            max_length: self.max_length,
            count: self.generate,
            custom_system_prompt,
        }
    }

    /// Resolved value for `key` (`name` or `provider.name`), as shown by
    /// `config get`. API keys are masked.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Some((section, prop)) = key.split_once('.') {
            let kind: ProviderKind = section.parse().ok()?;
            let p = self.providers.iter().find(|p| p.name == kind)?;
            return match prop {
                "key" => p.api_key.as_deref().map(mask_secret),
                "model" | "models" => Some(p.models.join(",")),
                "url" => Some(
                    p.base_url
                        .clone()
                        .unwrap_or_else(|| kind.default_base_url().to_string()),
                ),
                "path" => Some(
                    p.path
                        .clone()
                        .unwrap_or_else(|| kind.default_path().to_string()),
                ),
                "max_tokens" => Some(p.max_tokens.to_string()),
                "temperature" => Some(p.temperature.to_string()),
                "top_p" => Some(p.top_p.to_string()),
                _ => None,
            };
        }
        match key {
            "locale" => Some(self.locale.clone()),
            "generate" => Some(self.generate.to_string()),
            "type" => Some(self.style.to_string()),
            "max_length" => Some(self.max_length.to_string()),
            "timeout" => Some(self.timeout_ms.to_string()),
            "max_tokens" => Some(self.max_tokens.to_string()),
            "temperature" => Some(self.temperature.to_string()),
            "top_p" => Some(self.top_p.to_string()),
            "system_prompt" => self.system_prompt.clone(),
            "system_prompt_path" => self
                .system_prompt_path
                .as_ref()
                .map(|p| p.display().to_string()),
            "excludes" => Some(self.excludes.join(",")),
            _ => None,
        }
    }
}

fn validate_sampling(section: &str, temperature: f64, top_p: f64) -> Result<(), FlurryError> {
    if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
        return Err(FlurryError::Config(format!(
            "{section}: temperature must be between 0.0 and 2.0, got {temperature}"
        )));
    }
    if !top_p.is_finite() || !(0.0..=1.0).contains(&top_p) {
        return Err(FlurryError::Config(format!(
            "{section}: top_p must be between 0.0 and 1.0, got {top_p}"
        )));
    }
    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{tail}")
    }
}

fn expand_home(path: &str, env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = env("HOME")
    {
        return Path::new(&home).join(rest);
    }
    PathBuf::from(path)
}

/// Config file location: `$FLURRY_CONFIG_PATH`, else
/// `$XDG_CONFIG_HOME/flurry/config.toml`, else `~/.config/flurry/config.toml`.
pub fn config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = env("FLURRY_CONFIG_PATH").filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }
    let base = env("XDG_CONFIG_HOME")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            env("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
    base.join("flurry").join("config.toml")
}

// ---------------------------------------------------------------------------
// Config file editing (`flurry config set/del/list`)
// ---------------------------------------------------------------------------

/// Split `name` / `provider.name` into (section, property), validating both.
fn split_key(key: &str) -> Result<(Option<ProviderKind>, String), FlurryError> {
    let key = key.trim();
    match key.split_once('.') {
        Some((section, prop)) => {
            let kind: ProviderKind = section.parse().map_err(FlurryError::Config)?;
            let prop = if prop == "models" { "model" } else { prop };
            if !PROVIDER_KEYS.contains(&prop) {
                return Err(FlurryError::Config(format!(
                    "unknown provider setting: {key} (expected one of {})",
                    PROVIDER_KEYS.join(", ")
                )));
            }
            Ok((Some(kind), prop.to_string()))
        }
        None if GENERAL_KEYS.contains(&key) => Ok((None, key.to_string())),
        None => Err(FlurryError::Config(format!(
            "unknown setting: {key} (expected one of {}, or <provider>.<setting>)",
            GENERAL_KEYS.join(", ")
        ))),
    }
}

/// Type a raw `set` value according to the setting it is stored under.
fn parse_value(prop: &str, raw: &str) -> Result<toml::Value, FlurryError> {
    let raw = raw.trim();
    let invalid = |what: &str| FlurryError::Config(format!("{prop} must be {what}, got {raw:?}"));
    Ok(match prop {
        "generate" | "max_length" | "timeout" | "max_tokens" => {
            toml::Value::Integer(raw.parse().map_err(|_| invalid("an integer"))?)
        }
        "temperature" | "top_p" => toml::Value::Float(raw.parse().map_err(|_| invalid("a number"))?),
        "model" | "excludes" => toml::Value::Array(
            StringList::One(raw.to_string())
                .into_vec()
                .into_iter()
                .map(toml::Value::String)
                .collect(),
        ),
        "type" => {
            let style: CommitStyle = raw.parse().map_err(FlurryError::Config)?;
            toml::Value::String(style.to_string())
        }
        _ => toml::Value::String(raw.to_string()),
    })
}

/// Read the config file as a TOML table; a missing file is an empty table.
pub fn read_table(path: &Path) -> Result<toml::Table, FlurryError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text.parse::<toml::Table>()?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(toml::Table::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write atomically: temp file + rename prevents partial reads.
pub fn write_table(path: &Path, table: &toml::Table) -> Result<(), FlurryError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let text = toml::to_string_pretty(table)
        .map_err(|e| FlurryError::Config(format!("failed to serialize config: {e}")))?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, text)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Apply `key=value` pairs to the config file at `path`.
pub fn set_values(path: &Path, pairs: &[(String, String)]) -> Result<(), FlurryError> {
    let mut table = read_table(path)?;
    for (key, raw) in pairs {
        let (section, prop) = split_key(key)?;
        let value = parse_value(&prop, raw)?;
        match section {
            Some(kind) => {
                let entry = table
                    .entry(kind.config_key())
                    .or_insert(toml::Value::Table(toml::Table::new()));
                let toml::Value::Table(provider) = entry else {
                    return Err(FlurryError::Config(format!(
                        "{} is not a table in the config file",
                        kind.config_key()
                    )));
                };
                provider.insert(prop, value);
            }
            None => {
                table.insert(prop, value);
            }
        }
    }
    write_table(path, &table)
}

/// Remove a setting, or a whole provider table when `key` names one.
pub fn delete_value(path: &Path, key: &str) -> Result<(), FlurryError> {
    let mut table = read_table(path)?;
    let key = key.trim();

    let removed = if let Ok(kind) = key.parse::<ProviderKind>() {
        table.remove(kind.config_key()).is_some()
    } else {
        let (section, prop) = split_key(key)?;
        match section {
            None => table.remove(&prop).is_some(),
            Some(kind) => {
                let section_key = kind.config_key();
                let (removed, now_empty) = match table.get_mut(section_key) {
                    Some(toml::Value::Table(provider)) => {
                        (provider.remove(&prop).is_some(), provider.is_empty())
                    }
                    _ => (false, false),
                };
                if now_empty {
                    table.remove(section_key);
                }
                removed
            }
        }
    };

    if !removed {
        return Err(FlurryError::Config(format!("config not found: {key}")));
    }
    write_table(path, &table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_list_splits_commas() {
        let list = StringList::One(" a, b ,,c ".to_string());
        assert_eq!(list.into_vec(), vec!["a", "b", "c"]);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("short"), "****");
        assert_eq!(mask_secret("sk-abcdefgh1234"), "****1234");
    }

    #[test]
    fn models_alias_maps_to_model() {
        let (section, prop) = split_key("openai.models").unwrap();
        assert_eq!(section, Some(ProviderKind::OpenAi));
        assert_eq!(prop, "model");
    }

    #[test]
    fn typed_values() {
        assert_eq!(parse_value("generate", "3").unwrap(), toml::Value::Integer(3));
        assert_eq!(parse_value("top_p", "1").unwrap(), toml::Value::Float(1.0));
        assert!(parse_value("timeout", "soon").is_err());
    }
}
