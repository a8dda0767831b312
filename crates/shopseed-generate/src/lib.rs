//! Chunked synthetic record generation for shopseed.
//!
//! A [`ChunkedGenerator`] asks a [`TextBackend`] for bounded batches of JSON
//! records, cleans and validates every response against the entity's
//! schema, retries transient transport failures with exponential backoff,
//! and hands each validated batch to a caller-supplied [`Sink`].

pub mod backend;
pub mod engine;
pub mod entities;
pub mod errors;
pub mod model;
pub mod openai;
pub mod retry;
pub mod sink;

pub use backend::{Completion, CompletionRequest, TextBackend};
pub use engine::{ChunkedGenerator, Directives, EntityKind, ValidBatch};
pub use errors::{BackendError, GenerationError, GenerationFailure, SinkError, TransportKind};
pub use model::{GenerateOptions, GenerationReport};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper, retry_transient};
pub use sink::Sink;
