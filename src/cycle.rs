use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aggregate::{Aggregate, aggregate};
use crate::config::Config;
use crate::dispatch::{GenerationRequest, GenerationResult, ProviderClient};
use crate::error::FlurryError;
use crate::fanout::FanOutExecutor;
use crate::prompt;

/// Everything one cycle produced, for the presentation layer.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub aggregate: Aggregate,
    /// Raw per-instance results in expansion order.
    pub results: Vec<GenerationResult>,
    pub elapsed: Duration,
}

/// Prompt build → fan-out → aggregate for one commit attempt.
pub async fn run_cycle(
    config: &Config,
    diff: &str,
    client: Arc<dyn ProviderClient>,
) -> Result<CycleOutcome, FlurryError> {
    let start = Instant::now();

    let excluded: HashSet<String> = config.excludes.iter().cloned().collect();
    let pair = prompt::build(diff, &excluded, &config.prompt_options())?;

    let request = GenerationRequest {
        system_prompt: pair.system_prompt,
        user_prompt: pair.user_prompt,
        count: config.generate,
        timeout: Duration::from_millis(config.timeout_ms),
    };

    let results = FanOutExecutor::new(client)
        .run(&config.providers, request)
        .await?;
    let aggregate = aggregate(&results)?;

    Ok(CycleOutcome {
        aggregate,
        results,
        elapsed: start.elapsed(),
    })
}
