use serde::Serialize;

use crate::aggregate::Candidate;
use crate::cycle::CycleOutcome;
use crate::dispatch::FailureRecord;
use crate::error::FlurryError;

/// Machine-readable summary of one cycle, printed by `--json`.
#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub status: &'static str,
    pub candidates: Vec<Candidate>,
    pub failures: Vec<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn success(outcome: &CycleOutcome) -> Self {
        Self {
            status: "success",
            candidates: outcome.aggregate.candidates.iter().cloned().collect(),
            failures: outcome.aggregate.failures.clone(),
            error: None,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        }
    }

    pub fn error(err: &FlurryError, elapsed_ms: u64) -> Self {
        Self {
            status: "error",
            candidates: Vec::new(),
            failures: err.failures().to_vec(),
            error: Some(err.to_string()),
            elapsed_ms,
        }
    }

    /// Pretty JSON. Serialization failures still yield a valid error object.
    pub fn to_json(&self) -> String {
        match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                let escaped = e.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                format!(
                    r#"{{"status":"error","candidates":[],"failures":[],"error":"serialization failed: {escaped}","elapsed_ms":0}}"#
                )
            }
        }
    }
}
