use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{Id as TaskId, JoinSet};

use crate::dispatch::registry::{ProviderConfig, expand_instances};
use crate::dispatch::{FailureRecord, GenerationRequest, GenerationResult, ProviderClient};
use crate::error::{ErrorKind, FlurryError};

/// Upper bound on the per-instance timeout, so untrusted config can't
/// overflow `Instant` arithmetic.
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Runs one request per (provider, model) instance concurrently.
///
/// - every instance gets its own timeout; a slow one never delays the
///   others' results, and a failing one never cancels its siblings
/// - results come back in expansion order (provider, then model), not
///   completion order
/// - exactly one `GenerationResult` per instance
pub struct FanOutExecutor {
    client: Arc<dyn ProviderClient>,
}

impl FanOutExecutor {
    pub fn new(client: Arc<dyn ProviderClient>) -> Self {
        Self { client }
    }

    pub async fn run(
        &self,
        configs: &[ProviderConfig],
        request: GenerationRequest,
    ) -> Result<Vec<GenerationResult>, FlurryError> {
        let instances = expand_instances(configs);
        if instances.is_empty() {
            return Err(FlurryError::NoProviderConfigured);
        }

        let timeout_ms = (request.timeout.as_millis() as u64).min(MAX_TIMEOUT_MS);
        let timeout = Duration::from_millis(timeout_ms);
        let request = Arc::new(GenerationRequest { timeout, ..request });
        let start = Instant::now();

        tracing::info!(instances = instances.len(), timeout_ms, "fanning out generation requests");

        let mut set = JoinSet::new();
        // Task ID → slot, so a panicking task still fills its own slot.
        let mut task_slots: HashMap<TaskId, usize> = HashMap::new();

        for (slot, instance) in instances.iter().enumerate() {
            let client = self.client.clone();
            let request = request.clone();
            let instance = instance.clone();

            let abort_handle = set.spawn(async move {
                let label = instance.label();
                let instance_start = Instant::now();
                let result =
                    match tokio::time::timeout(timeout, client.generate(&request, &instance)).await
                    {
                        Ok(result) => result,
                        // Dropping the inner future abandons the in-flight call.
                        Err(_) => GenerationResult::failure(
                            label.clone(),
                            ErrorKind::Timeout,
                            format!("no response within {timeout_ms}ms"),
                        ),
                    };
                tracing::debug!(
                    source = %label,
                    success = result.is_success(),
                    latency_ms = instance_start.elapsed().as_millis() as u64,
                    "instance finished"
                );
                (slot, result)
            });
            task_slots.insert(abort_handle.id(), slot);
        }

        // One slot per instance, each written at most once.
        let mut slots: Vec<Option<GenerationResult>> = vec![None; instances.len()];

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, result)) => slots[slot] = Some(result),
                Err(join_err) => {
                    tracing::error!("generation task failed: {join_err}");
                    if let Some(&slot) = task_slots.get(&join_err.id()) {
                        slots[slot] = Some(GenerationResult::failure(
                            instances[slot].label(),
                            ErrorKind::UnknownError,
                            format!("task failed: {join_err}"),
                        ));
                    }
                }
            }
        }

        let results: Vec<GenerationResult> = slots
            .into_iter()
            .zip(&instances)
            .map(|(slot, instance)| {
                slot.unwrap_or_else(|| {
                    GenerationResult::failure(
                        instance.label(),
                        ErrorKind::UnknownError,
                        "task ended without a result",
                    )
                })
            })
            .collect();

        let failures: Vec<FailureRecord> = results
            .iter()
            .filter_map(|r| match r {
                GenerationResult::Failure(f) => Some(f.clone()),
                GenerationResult::Success { .. } => None,
            })
            .collect();

        tracing::info!(
            succeeded = results.len() - failures.len(),
            failed = failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fan-out complete"
        );

        if failures.len() == results.len() {
            return Err(FlurryError::AllProvidersFailed { failures });
        }
        Ok(results)
    }
}
