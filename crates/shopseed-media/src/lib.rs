//! Image generation for users and products.
//!
//! Jobs run on an external image service. Their results arrive either by
//! polling or through a callback, are uploaded to object storage, and the
//! public URL is written back to the record.

pub mod errors;
pub mod jobs;
pub mod notifier;
pub mod prompt;
pub mod service;
pub mod storage;
pub mod subject;
pub mod workflow;

pub use errors::{MediaError, Result};
pub use jobs::{HttpJobBackend, ImageJobBackend, JobStatus};
pub use notifier::{
    CallbackNotifier, CompletionMode, JobCallback, JobCompletionNotifier, JobHandle,
    PollingNotifier,
};
pub use prompt::{product_image_prompt, user_image_prompt};
pub use service::{ImageOutcome, ImageRecords, ImageService, Templates};
pub use storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};
pub use subject::{ImageSubject, ImageTarget};
pub use workflow::{DEFAULT_PROMPT_NODE, WorkflowTemplate};
