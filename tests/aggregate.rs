//! Result aggregation: dedup, attribution, failure separation.

use tokio_test::{assert_err, assert_ok};

use flurry::aggregate::aggregate;
use flurry::dispatch::{FailureRecord, GenerationResult};
use flurry::error::{ErrorKind, FlurryError};

fn success(source: &str, messages: &[&str]) -> GenerationResult {
    GenerationResult::Success {
        source: source.to_string(),
        messages: messages.iter().map(|m| m.to_string()).collect(),
    }
}

fn failure(source: &str, kind: ErrorKind) -> GenerationResult {
    GenerationResult::failure(source, kind, "detail")
}

// ---------------------------------------------------------------------------
// Dedup and attribution
// ---------------------------------------------------------------------------

#[test]
fn identical_messages_merge_sources_in_order() {
    let results = vec![
        success("OpenAI (gpt-4o)", &["feat: add login"]),
        success("Groq (llama)", &["fix: typo", "feat: add login"]),
        success("Gemini (flash)", &["feat: add login"]),
    ];
    let agg = assert_ok!(aggregate(&results));

    assert_eq!(agg.candidates.len(), 2);
    let first = agg.candidates.first().unwrap();
    assert_eq!(first.message, "feat: add login");
    assert_eq!(
        first.sources,
        vec!["OpenAI (gpt-4o)", "Groq (llama)", "Gemini (flash)"]
    );
    assert_eq!(agg.candidates.get(1).unwrap().message, "fix: typo");
    assert_eq!(agg.candidates.get(1).unwrap().sources, vec!["Groq (llama)"]);
}

#[test]
fn surrounding_whitespace_is_ignored_for_dedup() {
    let results = vec![
        success("A (m)", &["  feat: x\n"]),
        success("B (m)", &["feat: x"]),
    ];
    let agg = assert_ok!(aggregate(&results));
    assert_eq!(agg.candidates.len(), 1);
    assert_eq!(agg.candidates.first().unwrap().message, "feat: x");
}

#[test]
fn case_differences_are_distinct_candidates() {
    let results = vec![success("A (m)", &["feat: X", "feat: x"])];
    let agg = assert_ok!(aggregate(&results));
    assert_eq!(agg.candidates.len(), 2);
}

#[test]
fn same_source_is_listed_once() {
    let results = vec![success("A (m)", &["feat: x", "feat: x"])];
    let agg = assert_ok!(aggregate(&results));
    assert_eq!(agg.candidates.first().unwrap().sources, vec!["A (m)"]);
}

#[test]
fn blank_messages_are_dropped() {
    let results = vec![success("A (m)", &["", "   ", "chore: tidy"])];
    let agg = assert_ok!(aggregate(&results));
    let messages: Vec<&str> = agg.candidates.iter().map(|c| c.message.as_str()).collect();
    assert_eq!(messages, vec!["chore: tidy"]);
}

#[test]
fn aggregation_is_deterministic() {
    let results = vec![
        success("A (m)", &["feat: a", "feat: b"]),
        failure("B (m)", ErrorKind::Timeout),
        success("C (m)", &["feat: b"]),
    ];
    assert_eq!(aggregate(&results).unwrap(), aggregate(&results).unwrap());
}

#[test]
fn subject_is_first_line() {
    let results = vec![success("A (m)", &["feat: add x\n\nlonger body"])];
    let agg = assert_ok!(aggregate(&results));
    assert_eq!(agg.candidates.first().unwrap().subject(), "feat: add x");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failures_are_reported_and_never_candidates() {
    let results = vec![
        failure("Gemini (flash)", ErrorKind::AuthError),
        success("OpenAI (gpt-4o)", &["feat: x"]),
        failure("Groq (llama)", ErrorKind::RateLimited),
    ];
    let agg = assert_ok!(aggregate(&results));
    assert_eq!(agg.candidates.len(), 1);
    assert_eq!(
        agg.failures,
        vec![
            FailureRecord::new("Gemini (flash)", ErrorKind::AuthError, "detail"),
            FailureRecord::new("Groq (llama)", ErrorKind::RateLimited, "detail"),
        ]
    );
}

#[test]
fn only_blank_successes_is_no_candidates() {
    let results = vec![
        success("A (m)", &["  "]),
        failure("B (m)", ErrorKind::ParseError),
    ];
    let err = assert_err!(aggregate(&results));
    match err {
        FlurryError::NoCandidates { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].source, "B (m)");
        }
        other => panic!("expected NoCandidates, got {other:?}"),
    }
}

#[test]
fn empty_input_is_no_candidates() {
    assert!(matches!(
        aggregate(&[]),
        Err(FlurryError::NoCandidates { .. })
    ));
}
