use thiserror::Error;

/// Core error type shared across shopseed crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Model output could not be turned into a JSON array, even after repair.
    #[error("malformed backend output: {reason}")]
    MalformedOutput {
        reason: String,
        /// Cleaned text kept for diagnostics.
        cleaned: String,
    },
    /// A record schema violates its own invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Convenience alias for results returned by shopseed crates.
pub type Result<T> = std::result::Result<T, CoreError>;
