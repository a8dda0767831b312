use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use shopseed_core::{RecordSchema, parse_record_array, validate_batch};
use tracing::{debug, info, warn};

use crate::backend::{CompletionRequest, TextBackend};
use crate::errors::{GenerationError, GenerationFailure, Result};
use crate::model::{GenerateOptions, GenerationReport};
use crate::retry::{Sleeper, retry_transient};
use crate::sink::Sink;

/// System and user instruction text for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub system: String,
    pub user: String,
}

/// One generatable entity: its schema, its instruction text, and its record type.
pub trait EntityKind: Send + Sync {
    type Record: DeserializeOwned + Send + 'static;

    fn schema(&self) -> &RecordSchema;

    fn directives(&self, count: usize) -> Directives;

    fn max_tokens(&self) -> u32 {
        10_000
    }

    /// Extra filter applied after schema validation. `kept` holds the
    /// records already accepted from the same batch.
    fn keep(&self, _record: &Self::Record, _kept: &[Self::Record]) -> bool {
        true
    }
}

/// Validated output of one backend round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidBatch<R> {
    pub records: Vec<R>,
    pub dropped: usize,
    pub defaults_applied: usize,
    pub repaired: bool,
}

/// Drives repeated backend calls until the requested number of records has
/// been delivered to a sink.
pub struct ChunkedGenerator<E> {
    backend: Arc<dyn TextBackend>,
    sleeper: Arc<dyn Sleeper>,
    entity: E,
    options: GenerateOptions,
}

impl<E: EntityKind> ChunkedGenerator<E> {
    pub fn new(
        backend: Arc<dyn TextBackend>,
        sleeper: Arc<dyn Sleeper>,
        entity: E,
        options: GenerateOptions,
    ) -> Self {
        Self {
            backend,
            sleeper,
            entity,
            options,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    /// Generate `total_requested` records in batches of at most `chunk_size`.
    ///
    /// Batches are fetched and delivered strictly in order. `remaining`
    /// only shrinks once the sink has accepted a batch, so a failure leaves
    /// the report describing exactly what was committed.
    pub async fn generate<S>(
        &self,
        total_requested: usize,
        chunk_size: usize,
        sink: &mut S,
    ) -> std::result::Result<GenerationReport, GenerationFailure>
    where
        S: Sink<E::Record> + ?Sized,
    {
        let entity = self.entity.schema().entity().to_string();
        let mut report = GenerationReport::new(&entity, total_requested);
        if let Err(error) = self.check_request(total_requested, chunk_size) {
            return Err(GenerationFailure { report, error });
        }

        let started = Instant::now();
        let mut remaining = total_requested;
        while remaining > 0 {
            let batch_size = remaining.min(chunk_size);
            let batch_index = report.batches() + 1;
            debug!(
                event = "batch_requested",
                entity = %entity,
                batch = batch_index,
                batch_size,
                remaining
            );

            let fetched = retry_transient(&self.options.retry, self.sleeper.as_ref(), |_| {
                self.fetch_validated(batch_size)
            })
            .await;
            let (batch, attempts) = match fetched {
                Ok(fetched) => fetched,
                Err(error) => {
                    warn!(
                        event = "generation_failed",
                        entity = %entity,
                        batch = batch_index,
                        delivered = report.delivered,
                        error = %error
                    );
                    return Err(GenerationFailure { report, error });
                }
            };

            report.retries += attempts - 1;
            report.dropped += batch.dropped;
            report.defaults_applied += batch.defaults_applied;
            if batch.repaired {
                report.repaired_responses += 1;
            }

            let delivered = batch.records.len();
            if let Err(err) = sink.accept(batch.records).await {
                let error = GenerationError::Sink(err);
                warn!(
                    event = "generation_failed",
                    entity = %entity,
                    batch = batch_index,
                    delivered = report.delivered,
                    error = %error
                );
                return Err(GenerationFailure { report, error });
            }

            report.delivered += delivered;
            report.batch_sizes.push(batch_size);
            remaining -= batch_size;
            info!(
                event = "batch_delivered",
                entity = %entity,
                batch = batch_index,
                records = delivered,
                remaining
            );

            if remaining > 0 {
                self.sleeper.sleep(self.options.inter_batch_delay).await;
            }
        }

        info!(
            event = "generation_completed",
            entity = %entity,
            delivered = report.delivered,
            batches = report.batches(),
            dropped = report.dropped,
            retries = report.retries,
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        Ok(report)
    }

    /// Ask the backend for `count` records and return the parsed array unfiltered.
    pub async fn fetch_batch(&self, count: usize) -> Result<Vec<Value>> {
        Ok(self.fetch_raw(count).await?.0)
    }

    /// One round trip: fetch, validate, deserialize, filter, and cap at `count`.
    pub async fn fetch_validated(&self, count: usize) -> Result<ValidBatch<E::Record>> {
        let (raw, repaired) = self.fetch_raw(count).await?;
        let received = raw.len();
        let entity = self.entity.schema().entity();

        let validation = validate_batch(self.entity.schema(), raw);
        for (index, rejection) in &validation.rejected {
            warn!(
                event = "record_dropped",
                entity = %entity,
                index,
                reason = %rejection
            );
        }
        let defaults_applied = validation.defaults_applied();
        if defaults_applied > 0 {
            warn!(event = "defaults_applied", entity = %entity, count = defaults_applied);
        }

        let mut records = Vec::with_capacity(validation.accepted.len());
        for accepted in validation.accepted {
            match serde_json::from_value::<E::Record>(Value::Object(accepted.fields)) {
                Ok(record) if self.entity.keep(&record, &records) => records.push(record),
                Ok(_) => {
                    warn!(event = "record_dropped", entity = %entity, reason = "filtered");
                }
                Err(err) => {
                    warn!(event = "record_dropped", entity = %entity, reason = %err);
                }
            }
        }

        if records.is_empty() {
            return Err(GenerationError::AllRecordsMalformed { received });
        }
        records.truncate(count);

        Ok(ValidBatch {
            dropped: received - records.len(),
            records,
            defaults_applied,
            repaired,
        })
    }

    async fn fetch_raw(&self, count: usize) -> Result<(Vec<Value>, bool)> {
        let directives = self.entity.directives(count);
        let request = CompletionRequest {
            system: directives.system,
            user: directives.user,
            max_tokens: self
                .options
                .max_tokens
                .unwrap_or_else(|| self.entity.max_tokens()),
        };
        let text = self.backend.complete(&request).await?.into_text().await?;
        let parsed = parse_record_array(&text)?;
        if parsed.repaired {
            warn!(
                event = "response_repaired",
                entity = %self.entity.schema().entity(),
                backend = self.backend.name()
            );
        }
        Ok((parsed.records, parsed.repaired))
    }

    fn check_request(&self, total_requested: usize, chunk_size: usize) -> Result<()> {
        if total_requested == 0 {
            return Err(GenerationError::InvalidRequest(
                "total record count must be positive".to_string(),
            ));
        }
        if chunk_size == 0 {
            return Err(GenerationError::InvalidRequest(
                "chunk size must be positive".to_string(),
            ));
        }
        self.entity.schema().check()?;
        Ok(())
    }
}
