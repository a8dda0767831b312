use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Success envelope: `{ "success": true, "message"?, "count", "data" }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    count: usize,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(count: usize, data: T) -> Self {
        Self {
            success: true,
            message: None,
            count,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> ApiResponse<Vec<T>>
where
    T: Serialize,
{
    pub fn list(data: Vec<T>) -> Self {
        Self::new(data.len(), data)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
