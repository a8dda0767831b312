use std::error::Error as StdError;
use std::fmt;
use std::io;

use shopseed_core::CoreError;
use thiserror::Error;

use crate::model::GenerationReport;

/// Transport-layer failure class used to decide whether a call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionReset,
    TimedOut,
    NetworkUnreachable,
    ConnectionAborted,
    Other,
}

impl TransportKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, TransportKind::Other)
    }

    pub fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionReset => TransportKind::ConnectionReset,
            io::ErrorKind::TimedOut => TransportKind::TimedOut,
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                TransportKind::NetworkUnreachable
            }
            io::ErrorKind::ConnectionAborted => TransportKind::ConnectionAborted,
            _ => TransportKind::Other,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportKind::ConnectionReset => "connection reset",
            TransportKind::TimedOut => "timed out",
            TransportKind::NetworkUnreachable => "network unreachable",
            TransportKind::ConnectionAborted => "connection aborted",
            TransportKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// Failure reported by a text-generation backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("transport error ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },
    #[error("backend rejected credentials (status {status})")]
    Auth { status: u16 },
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected backend response: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        BackendError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Only connection-level failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transport { kind, .. } if kind.is_transient())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return BackendError::Protocol(err.to_string());
        }
        let kind = if err.is_timeout() {
            TransportKind::TimedOut
        } else {
            io_kind_in_chain(&err)
                .map(TransportKind::from_io)
                .unwrap_or(TransportKind::Other)
        };
        BackendError::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

fn io_kind_in_chain(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}

/// Error raised by a sink while accepting a validated batch.
#[derive(Debug)]
pub struct SinkError(Box<dyn StdError + Send + Sync>);

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for SinkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl SinkError {
    pub fn new(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        SinkError(err.into())
    }

    pub fn message(message: impl Into<String>) -> Self {
        SinkError(message.into().into())
    }

    /// Borrow the wrapped error, e.g. to downcast it to a store error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

/// Errors raised by the generation pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("malformed backend output: {reason}")]
    MalformedBackendOutput { reason: String, cleaned: String },
    #[error("all {received} generated records failed validation")]
    AllRecordsMalformed { received: usize },
    #[error("backend still failing after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: BackendError },
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("invalid generation request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Backend(err) if err.is_transient())
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedOutput { reason, cleaned } => {
                GenerationError::MalformedBackendOutput { reason, cleaned }
            }
            CoreError::InvalidSchema(message) => GenerationError::InvalidRequest(message),
        }
    }
}

/// A run that stopped early, together with what it delivered before stopping.
#[derive(Debug, Error)]
#[error("{error} (delivered {} of {} records)", .report.delivered, .report.requested)]
pub struct GenerationFailure {
    pub report: GenerationReport,
    #[source]
    pub error: GenerationError,
}

pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_failures_are_transient() {
        for kind in [
            TransportKind::ConnectionReset,
            TransportKind::TimedOut,
            TransportKind::NetworkUnreachable,
            TransportKind::ConnectionAborted,
        ] {
            assert!(BackendError::transport(kind, "boom").is_transient());
        }
        assert!(!BackendError::transport(TransportKind::Other, "boom").is_transient());
        assert!(!BackendError::Auth { status: 401 }.is_transient());
        assert!(
            !BackendError::Status {
                status: 500,
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn io_kinds_map_to_transport_kinds() {
        assert_eq!(
            TransportKind::from_io(io::ErrorKind::ConnectionReset),
            TransportKind::ConnectionReset
        );
        assert_eq!(
            TransportKind::from_io(io::ErrorKind::HostUnreachable),
            TransportKind::NetworkUnreachable
        );
        assert_eq!(
            TransportKind::from_io(io::ErrorKind::PermissionDenied),
            TransportKind::Other
        );
    }

    #[test]
    fn io_kind_is_found_behind_wrappers() {
        #[derive(Debug, Error)]
        #[error("wrapped")]
        struct Wrapper(#[source] io::Error);

        let err = Wrapper(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert_eq!(
            io_kind_in_chain(&err),
            Some(io::ErrorKind::ConnectionAborted)
        );
    }

    #[test]
    fn failure_message_includes_partial_count() {
        let failure = GenerationFailure {
            report: GenerationReport {
                requested: 25,
                delivered: 10,
                ..GenerationReport::default()
            },
            error: GenerationError::AllRecordsMalformed { received: 3 },
        };
        assert_eq!(
            failure.to_string(),
            "all 3 generated records failed validation (delivered 10 of 25 records)"
        );
    }
}
