//! Prompt builder: exclusion filtering, templates, response contract.

use std::collections::HashSet;

use flurry::error::FlurryError;
use flurry::prompt::{CommitStyle, PromptOptions, SystemPromptSource, build, fill_placeholders, filter_diff};

const SRC_DIFF: &str = "diff --git a/src/auth.rs b/src/auth.rs\n\
index 1111111..2222222 100644\n\
--- a/src/auth.rs\n\
+++ b/src/auth.rs\n\
@@ -1,2 +1,3 @@\n\
 fn login() {}\n\
+fn logout() {}\n";

const LOCK_DIFF: &str = "diff --git a/uv.lock b/uv.lock\n\
index 3333333..4444444 100644\n\
--- a/uv.lock\n\
+++ b/uv.lock\n\
@@ -1 +1 @@\n\
-version = 1\n\
+version = 2\n";

fn excluded(patterns: &[&str]) -> HashSet<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Diff filtering
// ---------------------------------------------------------------------------

#[test]
fn diff_of_only_excluded_files_is_empty_diff() {
    let err = build(LOCK_DIFF, &excluded(&["uv.lock"]), &PromptOptions::default()).unwrap_err();
    assert!(matches!(err, FlurryError::EmptyDiff));
}

#[test]
fn whitespace_diff_is_empty_diff() {
    let err = build("  \n\t\n", &HashSet::new(), &PromptOptions::default()).unwrap_err();
    assert!(matches!(err, FlurryError::EmptyDiff));
}

#[test]
fn excluded_sections_are_removed_others_kept() {
    let diff = format!("{SRC_DIFF}{LOCK_DIFF}");
    let filtered = filter_diff(&diff, &excluded(&["*.lock"]));
    assert_eq!(filtered, SRC_DIFF);

    let pair = build(&diff, &excluded(&["uv.lock"]), &PromptOptions::default()).unwrap();
    assert!(pair.user_prompt.contains("fn logout()"));
    assert!(!pair.user_prompt.contains("version = 2"));
}

#[test]
fn no_exclusions_keeps_diff_verbatim() {
    assert_eq!(filter_diff(LOCK_DIFF, &HashSet::new()), LOCK_DIFF);
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

#[test]
fn default_prompt_names_locale_style_and_count() {
    let options = PromptOptions {
        style: CommitStyle::Gitmoji,
        locale: "pt".to_string(),
        max_length: 72,
        count: 3,
        custom_system_prompt: None,
    };
    let pair = build(SRC_DIFF, &HashSet::new(), &options).unwrap();

    assert!(pair.system_prompt.contains("Write all messages in pt"));
    assert!(pair.system_prompt.contains("exactly 3 gitmoji style commit messages"));
    assert!(pair.system_prompt.contains("Max 72 characters"));
    assert!(pair.system_prompt.contains("Respond in pt."));
    assert!(pair.system_prompt.contains("Adicionar recurso"));
}

#[test]
fn custom_inline_prompt_replaces_template_but_keeps_contract() {
    let options = PromptOptions {
        custom_system_prompt: Some(SystemPromptSource::Inline(
            "House rules: {type} in {locale}, {max_length} chars".to_string(),
        )),
        ..PromptOptions::default()
    };
    let pair = build(SRC_DIFF, &HashSet::new(), &options).unwrap();

    assert!(
        pair.system_prompt
            .starts_with("House rules: conventional in en, 50 chars")
    );
    assert!(!pair.system_prompt.contains("## Requirements:"));
    assert!(pair.system_prompt.contains("Respond in en."));
    assert!(pair.system_prompt.contains("JSON array"));
}

#[test]
fn custom_prompt_file_is_read() {
    let dir = std::env::temp_dir().join(format!("flurry-prompt-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("prompt.txt");
    std::fs::write(&path, "From file for {generate} message(s)").unwrap();

    let options = PromptOptions {
        count: 2,
        custom_system_prompt: Some(SystemPromptSource::File(path)),
        ..PromptOptions::default()
    };
    let pair = build(SRC_DIFF, &HashSet::new(), &options).unwrap();
    assert!(pair.system_prompt.starts_with("From file for 2 message(s)"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_prompt_file_falls_back_to_default() {
    let options = PromptOptions {
        custom_system_prompt: Some(SystemPromptSource::File(
            std::env::temp_dir().join("flurry-does-not-exist/prompt.txt"),
        )),
        ..PromptOptions::default()
    };
    let pair = build(SRC_DIFF, &HashSet::new(), &options).unwrap();
    assert!(pair.system_prompt.contains("## Requirements:"));
}

#[test]
fn unknown_placeholders_are_left_alone() {
    let filled = fill_placeholders("{locale} {unknown}", &PromptOptions::default());
    assert_eq!(filled, "en {unknown}");
}

#[test]
fn build_is_deterministic() {
    let options = PromptOptions::default();
    let a = build(SRC_DIFF, &HashSet::new(), &options).unwrap();
    let b = build(SRC_DIFF, &HashSet::new(), &options).unwrap();
    assert_eq!(a, b);
}
