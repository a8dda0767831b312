//! HTTP surface, mounted under `/api`.

mod images;
mod products;
mod seeding;
mod users;

use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::SharedState;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/health", get(health))
        .merge(products::routes())
        .merge(users::routes())
        .merge(images::routes())
        .merge(seeding::routes());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> ApiResponse<Value> {
    ApiResponse::new(0, json!({ "status": "ok" }))
}

/// Parse a JSON body. An empty body yields `T::default()`.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    json_body(body)
}

fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Body {
        number_of_users: Option<usize>,
    }

    #[test]
    fn empty_bodies_use_defaults() {
        let parsed: Body = optional_body(&Bytes::from_static(b"  ")).unwrap();
        assert_eq!(parsed, Body::default());
        let parsed: Body = optional_body(&Bytes::from_static(br#"{"numberOfUsers": 4}"#)).unwrap();
        assert_eq!(parsed.number_of_users, Some(4));
    }

    #[test]
    fn broken_bodies_are_bad_requests() {
        let err = optional_body::<Body>(&Bytes::from_static(b"{oops")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
