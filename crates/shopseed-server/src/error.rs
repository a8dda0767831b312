use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shopseed_generate::{BackendError, GenerationError};
use shopseed_media::MediaError;
use shopseed_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures while starting or running the process.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("text backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("image setup error: {0}")]
    Media(#[from] MediaError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one API request, rendered as
/// `{ "success": false, "error": ..., "committed": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(StoreError),
    #[error("image error: {0}")]
    Media(MediaError),
    /// A failure after some records were already committed.
    #[error("{source}")]
    Interrupted {
        committed: usize,
        source: Box<ApiError>,
    },
}

impl ApiError {
    pub fn interrupted(committed: usize, err: impl Into<ApiError>) -> Self {
        ApiError::Interrupted {
            committed,
            source: Box::new(err.into()),
        }
    }

    /// Records committed before the failure, when known.
    pub fn committed(&self) -> Option<usize> {
        match self {
            ApiError::Interrupted { committed, .. } => Some(*committed),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Generation(GenerationError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Generation(GenerationError::Sink(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(MediaError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(_) => StatusCode::BAD_GATEWAY,
            ApiError::Interrupted { source, .. } => source.status(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            other => ApiError::Store(other),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Store(store) => store.into(),
            other => ApiError::Media(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(event = "request_failed", status = status.as_u16(), error = %self);
        } else {
            tracing::warn!(event = "request_rejected", status = status.as_u16(), error = %self);
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "committed": self.committed(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use shopseed_generate::TransportKind;

    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn partial_failures_report_the_committed_count() {
        let err = ApiError::interrupted(
            20,
            GenerationError::RetryExhausted {
                attempts: 5,
                last: BackendError::transport(TransportKind::TimedOut, "timed out"),
            },
        );
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["committed"], 20);
        assert!(body["error"].as_str().unwrap().contains("generation failed"));
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let err: ApiError = StoreError::NotFound {
            entity: "user",
            id: 9,
        }
        .into();
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "user 9 not found");
        assert!(body["committed"].is_null());
    }

    #[test]
    fn invalid_requests_are_client_errors() {
        let err = ApiError::from(GenerationError::InvalidRequest("zero".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
