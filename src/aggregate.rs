use serde::Serialize;

use crate::dispatch::{FailureRecord, GenerationResult};
use crate::error::FlurryError;

/// A unique generated message and every source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub message: String,
    pub sources: Vec<String>,
}

impl Candidate {
    /// First line of the message, for compact listings.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Ordered, deduplicated candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn first(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    /// Add a message, or attach `source` to the existing identical one.
    /// Returns false for messages that are blank after trimming.
    fn insert(&mut self, message: &str, source: &str) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        match self.candidates.iter_mut().find(|c| c.message == message) {
            Some(existing) => {
                if !existing.sources.iter().any(|s| s == source) {
                    existing.sources.push(source.to_string());
                }
            }
            None => self.candidates.push(Candidate {
                message: message.to_string(),
                sources: vec![source.to_string()],
            }),
        }
        true
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Candidates plus the failures surfaced alongside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub candidates: CandidateSet,
    pub failures: Vec<FailureRecord>,
}

/// Merge results into a candidate set.
///
/// Walks results in the given order and messages in per-result order.
/// Dedup is exact-text on the trimmed message, first writer wins; later
/// duplicates only add their source label. Failures are collected
/// separately and never become candidates.
pub fn aggregate(results: &[GenerationResult]) -> Result<Aggregate, FlurryError> {
    let mut candidates = CandidateSet::default();
    let mut failures = Vec::new();

    for result in results {
        match result {
            GenerationResult::Success { source, messages } => {
                let mut kept = 0usize;
                for message in messages {
                    if candidates.insert(message, source) {
                        kept += 1;
                    }
                }
                if kept == 0 {
                    tracing::warn!(source = %source, "provider returned only blank messages");
                }
            }
            GenerationResult::Failure(failure) => failures.push(failure.clone()),
        }
    }

    if candidates.is_empty() {
        return Err(FlurryError::NoCandidates { failures });
    }
    Ok(Aggregate {
        candidates,
        failures,
    })
}
