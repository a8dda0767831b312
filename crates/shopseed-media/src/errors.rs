use shopseed_store::StoreError;
use thiserror::Error;

/// Errors raised while producing and storing generated images.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image job request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image job service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("image job {job_id} failed: {detail}")]
    JobFailed { job_id: String, detail: String },
    #[error("image job {job_id} still unfinished after {attempts} polls")]
    PollTimeout { job_id: String, attempts: u32 },
    #[error("image job {job_id} finished without an image payload")]
    MissingImage { job_id: String },
    #[error("image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("workflow template error: {0}")]
    Template(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MediaError>;
