use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Tuning knobs for a chunked generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Pause between successful batches, to stay under backend rate limits.
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
    /// Output size bound per request; `None` keeps the entity's own limit.
    pub max_tokens: Option<u32>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            inter_batch_delay: Duration::from_secs(8),
            retry: RetryPolicy::default(),
            max_tokens: None,
        }
    }
}

impl GenerateOptions {
    /// Options without any waiting, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            inter_batch_delay: Duration::ZERO,
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::ZERO,
            },
            max_tokens: None,
        }
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub entity: String,
    pub requested: usize,
    /// Records handed to the sink.
    pub delivered: usize,
    /// Size requested from the backend for each completed batch, in order.
    pub batch_sizes: Vec<usize>,
    /// Elements discarded by validation or by the entity filter.
    pub dropped: usize,
    pub defaults_applied: usize,
    /// Responses that only parsed after structural repair.
    pub repaired_responses: usize,
    /// Backend attempts beyond the first, summed over all batches.
    pub retries: u32,
}

impl GenerationReport {
    pub fn new(entity: impl Into<String>, requested: usize) -> Self {
        Self {
            entity: entity.into(),
            requested,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> usize {
        self.batch_sizes.len()
    }
}
